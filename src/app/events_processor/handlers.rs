use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::models::DieselUlid;

#[derive(Debug, thiserror::Error)]
#[error("event handler failed: {0}")]
pub struct HandlerError(pub String);

/// One reaction to one event type. Registering a handler per `event_type` is
/// this crate's whole subscription model (spec.md §9: a generic pub/sub bus
/// is explicitly out of scope, in-process fan-out is enough).
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, aggregate_id: DieselUlid, payload: &Value) -> Result<(), HandlerError>;
}

#[derive(Default)]
pub struct EventHandlerRegistry {
    handlers: RwLock<HashMap<String, Vec<Arc<dyn EventHandler>>>>,
}

impl EventHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, event_type: impl Into<String>, handler: Arc<dyn EventHandler>) {
        self.handlers.write().expect("event handler registry lock poisoned").entry(event_type.into()).or_default().push(handler);
    }

    pub fn handlers_for(&self, event_type: &str) -> Vec<Arc<dyn EventHandler>> {
        self.handlers.read().expect("event handler registry lock poisoned").get(event_type).cloned().unwrap_or_default()
    }

    /// Backs the `/health` endpoint's `registry.event_types` listing
    /// (spec.md §6).
    pub fn registered_event_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.read().expect("event handler registry lock poisoned").keys().cloned().collect();
        types.sort();
        types
    }
}
