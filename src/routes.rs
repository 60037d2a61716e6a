use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::app::events_processor::EventProcessor;
use crate::app::task_processor::TaskProcessor;
use crate::config::{EventsConfig, TasksConfig};
use crate::models::DieselUlid;

/// Shared handles the operational HTTP surface needs (spec.md §6): the
/// health endpoint and the three force-process endpoints. Nothing else is
/// exposed — no ORM-backed CRUD, no webhook ingestion (out of this crate's
/// scope per spec.md §1).
#[derive(Clone)]
pub struct AppState {
    pub events: Arc<EventProcessor>,
    pub tasks: Arc<TaskProcessor>,
    pub events_config: EventsConfig,
    pub tasks_config: TasksConfig,
    pub started_at: Instant,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/process-event", post(process_event))
        .route("/process-batch", post(process_batch))
        .route("/process-task", post(process_task))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ProcessEventBody {
    event_id: String,
}

#[derive(Debug, Deserialize)]
struct ProcessTaskBody {
    task_id: String,
}

/// spec.md §6 health endpoint: 200 when healthy, 503 otherwise. "Healthy"
/// means the most recent poll tick of both the Event Processor and the
/// Task Processor didn't error outright; a persistent transient store
/// error surfaces here as `status: "unhealthy"` / 503 (spec.md §7) via
/// `EventProcessor`/`TaskProcessor::last_poll_error`.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let event_stats = state.events.stats();
    let task_stats = state.tasks.stats();
    let event_poll_error = state.events.last_poll_error();
    let task_poll_error = state.tasks.last_poll_error();

    let status_code = if event_poll_error.is_some() || task_poll_error.is_some() { StatusCode::SERVICE_UNAVAILABLE } else { StatusCode::OK };

    let registry_types = state.events.registered_event_types();
    let body = json!({
        "status": if status_code == StatusCode::OK { "healthy" } else { "unhealthy" },
        "service": "agentsms",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "stats": {
            "processed": event_stats.processed,
            "success": event_stats.processed,
            "error": event_stats.retried,
            "dead_letter": event_stats.dead_lettered,
            "tasks_completed": task_stats.completed,
            "tasks_failed": task_stats.failed,
        },
        "config": {
            "poll_interval_ms": state.events_config.poll_interval_seconds * 1000,
            "batch_size": state.events_config.batch_size,
            "max_retries": state.events_config.max_retries,
        },
        "registry": {
            "handlers_count": registry_types.len(),
            "event_types": registry_types,
        },
        "errors": {
            "events_last_poll_error": event_poll_error,
            "tasks_last_poll_error": task_poll_error,
        },
    });

    (status_code, Json(body))
}

/// spec.md §6 `/process-event`: 202 on accept, 400 if missing or already
/// processed.
async fn process_event(State(state): State<AppState>, Json(body): Json<ProcessEventBody>) -> impl IntoResponse {
    let Ok(event_id) = body.event_id.parse::<DieselUlid>() else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid event_id" })));
    };

    let events = state.events.clone();
    let result = tokio::task::spawn_blocking(move || events.force_process(event_id)).await;

    match result {
        Ok(Ok(_outcome)) => (StatusCode::ACCEPTED, Json(json!({ "accepted": true }))),
        Ok(Err(err)) => (StatusCode::BAD_REQUEST, Json(json!({ "error": err.to_string() }))),
        Err(join_err) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": join_err.to_string() }))),
    }
}

/// spec.md §6 `/process-batch`: 202 triggers one immediate poll.
async fn process_batch(State(state): State<AppState>) -> impl IntoResponse {
    let events = state.events.clone();
    let result = tokio::task::spawn_blocking(move || events.run_once()).await;

    match result {
        Ok(Ok(advanced)) => (StatusCode::ACCEPTED, Json(json!({ "accepted": true, "advanced": advanced }))),
        Ok(Err(err)) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": err.to_string() }))),
        Err(join_err) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": join_err.to_string() }))),
    }
}

/// spec.md §6 `/process-task`: 202 on accept.
async fn process_task(State(state): State<AppState>, Json(body): Json<ProcessTaskBody>) -> impl IntoResponse {
    let Ok(task_id) = body.task_id.parse::<DieselUlid>() else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid task_id" })));
    };

    let tasks = state.tasks.clone();
    let result = tokio::task::spawn_blocking(move || tasks.execute(task_id)).await;

    match result {
        Ok(Ok(_outcome)) => (StatusCode::ACCEPTED, Json(json!({ "accepted": true }))),
        Ok(Err(err)) => (StatusCode::BAD_REQUEST, Json(json!({ "error": err.to_string() }))),
        Err(join_err) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": join_err.to_string() }))),
    }
}
