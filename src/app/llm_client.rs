use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::app::renderer::LlmClient;
use crate::config::ProviderConfig;

/// The only concrete `LlmClient`: a thin `reqwest` wrapper over a
/// chat-completions-shaped HTTP endpoint. `Renderer`/`RelevanceClassifier`
/// depend on the `LlmClient` trait, not on this struct, so a test double can
/// stand in without touching the network (spec.md §9's dependency-injection
/// note).
pub struct HttpLlmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl HttpLlmClient {
    pub fn new(config: &ProviderConfig) -> Self {
        let client = reqwest::Client::builder().timeout(config.request_timeout()).build().expect("reqwest client config is static");
        Self { client, base_url: config.llm_base_url.clone(), api_key: config.llm_api_key.clone() }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, String> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "messages": [{ "role": "user", "content": prompt }],
            }))
            .send()
            .await
            .map_err(|err| err.to_string())?;

        if !response.status().is_success() {
            return Err(format!("llm provider returned {}", response.status()));
        }

        let body: ChatCompletionResponse = response.json().await.map_err(|err| err.to_string())?;
        body.choices.into_iter().next().map(|choice| choice.message.content).ok_or_else(|| "llm provider returned no choices".to_string())
    }
}
