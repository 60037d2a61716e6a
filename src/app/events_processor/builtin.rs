use async_trait::async_trait;
use diesel::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::orchestrator::Orchestrator;
use crate::database::DbPool;
use crate::models::{DieselUlid, EnqueueRequest, Priority};
use crate::schema::users;

use super::handlers::{EventHandler, HandlerError};

/// `user.intro_inquiry`: a user has asked how the service works. Looks the
/// user up by `aggregate_id` and enqueues a welcome message through the
/// Orchestrator — the "fan events out to handlers that create follow-on
/// work" cascade (spec.md §4.2).
///
/// A payload that references a user row that doesn't exist raises on every
/// attempt; this handler never decides to give up early, so a row like
/// that keeps retrying until the Event Processor's own retry budget is
/// exhausted and it's moved to `event_dead_letters` (spec.md §8 scenario 4).
pub struct UserIntroInquiryHandler {
    pool: DbPool,
    orchestrator: Arc<Orchestrator>,
}

impl UserIntroInquiryHandler {
    pub fn new(pool: DbPool, orchestrator: Arc<Orchestrator>) -> Self {
        Self { pool, orchestrator }
    }
}

#[async_trait]
impl EventHandler for UserIntroInquiryHandler {
    async fn handle(&self, aggregate_id: DieselUlid, _payload: &Value) -> Result<(), HandlerError> {
        let pool = self.pool.clone();
        let user_exists = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|err| HandlerError(err.to_string()))?;
            diesel::select(diesel::dsl::exists(users::table.find(aggregate_id)))
                .get_result::<bool>(&mut conn)
                .map_err(|err| HandlerError(err.to_string()))
        })
        .await
        .map_err(|err| HandlerError(err.to_string()))??;

        if !user_exists {
            return Err(HandlerError(format!("user {aggregate_id} not found")));
        }

        let request = EnqueueRequest {
            user_id: aggregate_id,
            producer_id: "event_processor".to_string(),
            payload: json!({ "type": "welcome" }),
            priority: Priority::Medium,
            can_delay: true,
            requires_fresh_context: false,
            scheduled_for: None,
            idempotency_key: Some(format!("intro_inquiry:{aggregate_id}")),
            supersedes_of: None,
        };

        let orchestrator = self.orchestrator.clone();
        tokio::task::spawn_blocking(move || orchestrator.enqueue(request))
            .await
            .map_err(|err| HandlerError(err.to_string()))?
            .map_err(|err| HandlerError(err.to_string()))?;

        Ok(())
    }
}

/// `solution.research_requested`: published by the Task Processor's
/// `trigger_solution_research` handler (`task_processor::builtin`). The
/// actual research/synthesis is owned by the external agent logic this
/// crate boots alongside (spec.md §1's excluded collaborators); this
/// handler's job is only to turn the request into a concrete downstream
/// effect the Send Pipeline can exercise — a `solution_update` message
/// telling the user their request was received.
pub struct SolutionResearchRequestedHandler {
    orchestrator: Arc<Orchestrator>,
}

impl SolutionResearchRequestedHandler {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl EventHandler for SolutionResearchRequestedHandler {
    async fn handle(&self, aggregate_id: DieselUlid, payload: &Value) -> Result<(), HandlerError> {
        let topic = payload.get("topic").and_then(Value::as_str).unwrap_or("unspecified").to_string();

        let request = EnqueueRequest {
            user_id: aggregate_id,
            producer_id: "event_processor".to_string(),
            payload: json!({
                "type": "solution_update",
                "topic": topic,
                "summary": format!("We're looking into {topic} and will follow up with what we find."),
            }),
            priority: Priority::High,
            can_delay: true,
            requires_fresh_context: true,
            scheduled_for: None,
            idempotency_key: Some(format!("solution_research_requested:{aggregate_id}:{topic}")),
            supersedes_of: None,
        };

        let orchestrator = self.orchestrator.clone();
        tokio::task::spawn_blocking(move || orchestrator.enqueue(request))
            .await
            .map_err(|err| HandlerError(err.to_string()))?
            .map_err(|err| HandlerError(err.to_string()))?;

        Ok(())
    }
}
