use async_trait::async_trait;
use handlebars::Handlebars;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::models::DieselUlid;

/// What a `Renderer` sees of a user's conversation when turning a payload
/// into prose (spec.md §6 `render(payload, user_context)`).
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user_id: DieselUlid,
    pub recent_messages: Vec<String>,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template render failed: {0}")]
    Template(#[from] handlebars::RenderError),
    #[error("llm client error: {0}")]
    Llm(String),
}

/// Inverts the Orchestrator→Agent rendering dependency spec.md §9 calls out:
/// the Orchestrator depends on this trait, agent/LLM code implements it.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, payload: &Value, context: &UserContext) -> Result<String, RenderError>;
}

/// Non-LLM fallback renderer, keyed by `payload.type`, for payload variants
/// that don't need generative prose. The default renderer unknown
/// (`Other`) payload tags fall back to, per the Duck-typed-payloads note.
pub struct TemplateRenderer {
    handlebars: Handlebars<'static>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars
            .register_template_string("welcome", "Hi! I'm {{persona}}, here to help you get started.")
            .expect("static template");
        handlebars
            .register_template_string("solution_update", "Update on {{topic}}: {{summary}}")
            .expect("static template");
        handlebars
            .register_template_string(
                "intro_opportunity",
                "I'd like to introduce you to {{contact_name}} about {{topic}}.",
            )
            .expect("static template");
        handlebars
            .register_template_string("weekly_summary", "This week: {{#each highlights}}{{this}}; {{/each}}")
            .expect("static template");
        handlebars
            .register_template_string("payment_required", "A payment of {{amount_cents}} {{currency}} is due.")
            .expect("static template");
        handlebars
            .register_template_string("other", "You have a new update.")
            .expect("static template");
        Self { handlebars }
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Renderer for TemplateRenderer {
    async fn render(&self, payload: &Value, _context: &UserContext) -> Result<String, RenderError> {
        let type_tag = payload.get("type").and_then(Value::as_str).unwrap_or("other");
        let template_name = if self.handlebars.has_template(type_tag) {
            type_tag
        } else {
            tracing::warn!(payload_type = type_tag, "no template registered, routing to default renderer");
            "other"
        };
        Ok(self.handlebars.render(template_name, payload)?)
    }
}

/// The real LLM provider, referenced only through this interface (spec.md
/// §1: the LLM provider is an external collaborator outside this crate).
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, String>;
}

pub struct LlmRenderer {
    client: Arc<dyn LlmClient>,
}

impl LlmRenderer {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Renderer for LlmRenderer {
    async fn render(&self, payload: &Value, context: &UserContext) -> Result<String, RenderError> {
        let prompt = format!(
            "Write one SMS (max 1600 chars) for this payload, given the recent conversation.\npayload: {payload}\nrecent: {:?}",
            context.recent_messages
        );
        self.client.complete(&prompt).await.map_err(RenderError::Llm)
    }
}
