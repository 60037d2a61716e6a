use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::orchestrator::{Orchestrator, OrchestratorError};
use crate::database::DbPool;
use crate::models::{DieselUlid, EnqueueRequest, Priority};
use crate::schema::{events, users};

use super::handlers::{HandlerError, TaskHandler};

fn require_user_id(user_id: Option<DieselUlid>) -> Result<DieselUlid, HandlerError> {
    user_id.ok_or_else(|| HandlerError::permanent("task has no user_id"))
}

/// `OrchestratorError` already separates "this will never work" (bad
/// input, row not found) from "try again later" (store/render/relevance
/// failures) — carry that distinction through into the task's retry
/// decision instead of collapsing everything to a string.
fn classify_orchestrator_err(err: OrchestratorError) -> HandlerError {
    match err {
        OrchestratorError::UserNotFound(_) | OrchestratorError::EmptyPayload | OrchestratorError::NotFound(_) | OrchestratorError::NotQueued(_) => {
            HandlerError::permanent(err.to_string())
        }
        OrchestratorError::Store(_) | OrchestratorError::Diesel(_) | OrchestratorError::Render(_) | OrchestratorError::Relevance(_) | OrchestratorError::TaskJoin => {
            HandlerError::retryable(err.to_string())
        }
    }
}

/// `schedule_follow_up_message`: re-enters the Message Orchestrator's
/// `enqueue` with a payload built from the task's `context`
/// (spec.md §4.3, the Task Processor's main cascade back into the
/// Orchestrator).
pub struct ScheduleFollowUpMessageHandler {
    orchestrator: Arc<Orchestrator>,
}

impl ScheduleFollowUpMessageHandler {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl TaskHandler for ScheduleFollowUpMessageHandler {
    async fn execute(&self, user_id: Option<DieselUlid>, context: &Value) -> Result<Value, HandlerError> {
        let user_id = require_user_id(user_id)?;
        let payload = context.get("payload").cloned().ok_or_else(|| HandlerError::permanent("context.payload missing"))?;
        let priority = context
            .get("priority")
            .and_then(Value::as_str)
            .map(Priority::from_str)
            .unwrap_or(Priority::Medium);
        let producer_id = context.get("producer_id").and_then(Value::as_str).unwrap_or("task_processor").to_string();

        let request = EnqueueRequest {
            user_id,
            producer_id,
            payload,
            priority,
            can_delay: true,
            requires_fresh_context: context.get("requires_fresh_context").and_then(Value::as_bool).unwrap_or(false),
            scheduled_for: None,
            idempotency_key: None,
            supersedes_of: None,
        };

        let orchestrator = self.orchestrator.clone();
        let queued_message_id = tokio::task::spawn_blocking(move || orchestrator.enqueue(request))
            .await
            .map_err(|err| HandlerError::retryable(err.to_string()))?
            .map_err(classify_orchestrator_err)?;

        Ok(json!({ "queued_message_id": queued_message_id.to_string() }))
    }
}

/// `update_user_profile_field`: a small, explicitly enumerated set of
/// columns a task is allowed to touch. Not a generic key-value writer —
/// arbitrary column names from task context would bypass the type system
/// entirely.
pub struct UpdateUserProfileFieldHandler {
    pool: DbPool,
}

impl UpdateUserProfileFieldHandler {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskHandler for UpdateUserProfileFieldHandler {
    async fn execute(&self, user_id: Option<DieselUlid>, context: &Value) -> Result<Value, HandlerError> {
        let user_id = require_user_id(user_id)?;
        let field = context.get("field").and_then(Value::as_str).ok_or_else(|| HandlerError::permanent("context.field missing"))?;
        let value = context.get("value").ok_or_else(|| HandlerError::permanent("context.value missing"))?;

        let pool = self.pool.clone();
        let field = field.to_string();
        let value = value.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|err| HandlerError::retryable(err.to_string()))?;
            let rows = match field.as_str() {
                "timezone" => {
                    let timezone = value.as_str().ok_or_else(|| HandlerError::permanent("value must be a string"))?;
                    diesel::update(users::table.find(user_id)).set(users::timezone.eq(timezone)).execute(&mut conn)
                }
                "point_of_contact_agent" => {
                    let agent = value.as_str().map(str::to_string);
                    diesel::update(users::table.find(user_id)).set(users::point_of_contact_agent.eq(agent)).execute(&mut conn)
                }
                "quiet_hours_start_minute" => {
                    let minute = value.as_i64().ok_or_else(|| HandlerError::permanent("value must be an integer"))? as i32;
                    diesel::update(users::table.find(user_id)).set(users::quiet_hours_start_minute.eq(minute)).execute(&mut conn)
                }
                "quiet_hours_end_minute" => {
                    let minute = value.as_i64().ok_or_else(|| HandlerError::permanent("value must be an integer"))? as i32;
                    diesel::update(users::table.find(user_id)).set(users::quiet_hours_end_minute.eq(minute)).execute(&mut conn)
                }
                "engagement_score" => {
                    let score = value.as_f64().ok_or_else(|| HandlerError::permanent("value must be a number"))?;
                    diesel::update(users::table.find(user_id)).set(users::engagement_score.eq(Some(score))).execute(&mut conn)
                }
                other => return Err(HandlerError::permanent(format!("field '{other}' is not updatable by a task"))),
            };
            rows.map_err(HandlerError::from)
        })
        .await
        .map_err(|err| HandlerError::retryable(err.to_string()))??;

        Ok(json!({ "updated": true }))
    }
}

/// `trigger_solution_research`: records an `solution.research_requested`
/// Event rather than calling an agent directly, so the Event Processor's
/// registry (and whatever external research agent subscribes to that event
/// type) owns what happens next — the Design Notes' "trigger-based
/// cascades" boundary.
pub struct TriggerSolutionResearchHandler {
    pool: DbPool,
}

impl TriggerSolutionResearchHandler {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskHandler for TriggerSolutionResearchHandler {
    async fn execute(&self, user_id: Option<DieselUlid>, context: &Value) -> Result<Value, HandlerError> {
        let user_id = require_user_id(user_id)?;
        let topic = context.get("topic").and_then(Value::as_str).unwrap_or("unspecified").to_string();
        let payload = json!({ "topic": topic });

        let pool = self.pool.clone();
        let event_id = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|err| HandlerError::retryable(err.to_string()))?;
            let new_event = crate::models::NewEvent::new("solution.research_requested", "user", user_id, payload);
            let id = new_event.id;
            diesel::insert_into(events::table).values(&new_event).execute(&mut conn).map_err(HandlerError::from)?;
            Ok::<_, HandlerError>(id)
        })
        .await
        .map_err(|err| HandlerError::retryable(err.to_string()))??;

        Ok(json!({ "event_id": event_id.to_string() }))
    }
}

/// `re_engagement_check`: if the user has gone quiet, schedules a low
/// priority, delayable weekly-summary style nudge through the Orchestrator;
/// otherwise a no-op.
pub struct ReengagementCheckHandler {
    orchestrator: Arc<Orchestrator>,
}

impl ReengagementCheckHandler {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl TaskHandler for ReengagementCheckHandler {
    async fn execute(&self, user_id: Option<DieselUlid>, context: &Value) -> Result<Value, HandlerError> {
        let user_id = require_user_id(user_id)?;
        let highlights: Vec<String> = context
            .get("highlights")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(|item| item.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let orchestrator = self.orchestrator.clone();
        let active = tokio::task::spawn_blocking(move || orchestrator.is_user_active(user_id))
            .await
            .map_err(|err| HandlerError::retryable(err.to_string()))?
            .map_err(classify_orchestrator_err)?;

        if active {
            return Ok(json!({ "enqueued": false, "reason": "user recently active" }));
        }

        let request = EnqueueRequest {
            user_id,
            producer_id: "task_processor".to_string(),
            payload: json!({ "type": "weekly_summary", "highlights": highlights }),
            priority: Priority::Low,
            can_delay: true,
            requires_fresh_context: false,
            scheduled_for: Some(Utc::now()),
            idempotency_key: None,
            supersedes_of: None,
        };

        let orchestrator = self.orchestrator.clone();
        let queued_message_id = tokio::task::spawn_blocking(move || orchestrator.enqueue(request))
            .await
            .map_err(|err| HandlerError::retryable(err.to_string()))?
            .map_err(classify_orchestrator_err)?;

        Ok(json!({ "enqueued": true, "queued_message_id": queued_message_id.to_string() }))
    }
}
