use async_trait::async_trait;
use chrono::Duration;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::app::renderer::LlmClient;

/// The tri-valued relevance contract from spec.md §6
/// (`classify_relevance(...) -> {RELEVANT|STALE|CONTEXTUAL, ...}`). The
/// exact LLM prompt is out of scope per spec.md §9's Open Questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelevanceVerdict {
    Relevant,
    Stale,
    Contextual,
}

#[derive(Debug, Error)]
pub enum RelevanceError {
    #[error("llm client error: {0}")]
    Llm(String),
}

#[async_trait]
pub trait RelevanceClassifier: Send + Sync {
    async fn classify(&self, payload: &Value, recent_messages: &[String], elapsed: Duration) -> Result<RelevanceVerdict, RelevanceError>;
}

/// Used when a producer never sets `requires_fresh_context`, and as the
/// default in tests that don't exercise the LLM path.
pub struct AlwaysRelevant;

#[async_trait]
impl RelevanceClassifier for AlwaysRelevant {
    async fn classify(&self, _payload: &Value, _recent_messages: &[String], _elapsed: Duration) -> Result<RelevanceVerdict, RelevanceError> {
        Ok(RelevanceVerdict::Relevant)
    }
}

/// Fails open (spec.md §4.1/§7: "LLM timeout on relevance: log warning,
/// treat as RELEVANT and proceed") — only an explicit STALE verdict from the
/// LLM is fail-closed.
pub struct LlmRelevanceClassifier {
    client: Arc<dyn LlmClient>,
}

impl LlmRelevanceClassifier {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RelevanceClassifier for LlmRelevanceClassifier {
    async fn classify(&self, payload: &Value, recent_messages: &[String], elapsed: Duration) -> Result<RelevanceVerdict, RelevanceError> {
        let prompt = format!(
            "Classify relevance (RELEVANT|STALE|CONTEXTUAL) of payload {payload} given recent messages {:?} and {}s elapsed since enqueue.",
            recent_messages,
            elapsed.num_seconds()
        );
        match self.client.complete(&prompt).await {
            Ok(reply) => Ok(parse_verdict(&reply)),
            Err(err) => {
                tracing::warn!(error = %err, "relevance classifier unavailable, failing open as RELEVANT");
                Ok(RelevanceVerdict::Relevant)
            }
        }
    }
}

fn parse_verdict(reply: &str) -> RelevanceVerdict {
    let upper = reply.to_uppercase();
    if upper.contains("STALE") {
        RelevanceVerdict::Stale
    } else if upper.contains("CONTEXTUAL") {
        RelevanceVerdict::Contextual
    } else {
        RelevanceVerdict::Relevant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stale_case_insensitively() {
        assert_eq!(parse_verdict("Verdict: stale, reasoning: ..."), RelevanceVerdict::Stale);
    }

    #[test]
    fn defaults_to_relevant_on_unrecognized_reply() {
        assert_eq!(parse_verdict("hello"), RelevanceVerdict::Relevant);
    }
}
