use anyhow::Result;
use std::env;
use std::time::Duration;

/// Connection details for the outbound SMS Dispatcher boundary and the
/// LLM-backed relevance classifier/renderer (spec.md §5, §9). Both are
/// injected `reqwest::Client`-based collaborators rather than globals, so
/// this struct only carries what's needed to construct them.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub sms_base_url: String,
    pub sms_api_key: String,
    pub sms_from_number: String,
    pub llm_base_url: String,
    pub llm_api_key: String,
    pub request_timeout_seconds: u64,
}

impl ProviderConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            sms_base_url: env::var("SMS_PROVIDER_BASE_URL")
                .unwrap_or_else(|_| "https://api.sms-provider.example/v1".to_string()),
            sms_api_key: env::var("SMS_PROVIDER_API_KEY").unwrap_or_default(),
            sms_from_number: env::var("SMS_FROM_NUMBER").unwrap_or_default(),
            llm_base_url: env::var("LLM_PROVIDER_BASE_URL")
                .unwrap_or_else(|_| "https://api.llm-provider.example/v1".to_string()),
            llm_api_key: env::var("LLM_PROVIDER_API_KEY").unwrap_or_default(),
            request_timeout_seconds: env::var("PROVIDER_REQUEST_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}
