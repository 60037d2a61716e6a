use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::models::DieselUlid;

/// `retryable` lets a handler say whether a failure is worth the backoff
/// loop at all (spec.md §4.3/§7: a logic/invariant violation should mark
/// the task `failed` on the spot, not burn through `max_retries` first).
/// Transient failures (DB errors, a downstream timeout) should retry.
#[derive(Debug, thiserror::Error)]
#[error("task handler failed: {message}")]
pub struct HandlerError {
    pub message: String,
    pub retryable: bool,
}

impl HandlerError {
    /// A failure that might succeed on a later attempt.
    pub fn retryable(message: impl Into<String>) -> Self {
        Self { message: message.into(), retryable: true }
    }

    /// A failure that will never succeed no matter how many times it's
    /// retried (bad input, a violated invariant) — skip straight to `failed`.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self { message: message.into(), retryable: false }
    }
}

impl From<diesel::result::Error> for HandlerError {
    fn from(err: diesel::result::Error) -> Self {
        HandlerError::retryable(err.to_string())
    }
}

/// One kind of agent work a `Task` row can carry out (spec.md §4.3's handler
/// registry: schedule follow-up message, update user profile field, trigger
/// solution research, re-engagement check). `context` is the Task's own
/// `context` column; the returned `Value` is persisted back onto `result`.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn execute(&self, user_id: Option<DieselUlid>, context: &Value) -> Result<Value, HandlerError>;
}

#[derive(Default)]
pub struct TaskHandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn TaskHandler>>>,
}

impl TaskHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, task_type: impl Into<String>, handler: Arc<dyn TaskHandler>) {
        self.handlers.write().expect("task handler registry lock poisoned").insert(task_type.into(), handler);
    }

    pub fn handler_for(&self, task_type: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.read().expect("task handler registry lock poisoned").get(task_type).cloned()
    }
}
