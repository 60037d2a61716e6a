use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::DieselUlid;

/// `metadata.retry_count`/`metadata.last_error` are the only parts of an
/// Event mutable after creation besides `processed` itself (spec.md §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventMetadata {
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    /// Optional explicit backoff marker; if set and in the future, `poll()`
    /// skips the event until then (spec.md §4.2, "explicit exponential
    /// backoff may be layered by setting `not_before`").
    #[serde(default)]
    pub not_before: Option<DateTime<Utc>>,
}

impl EventMetadata {
    pub fn from_json(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, QueryableByName, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Event {
    pub id: DieselUlid,
    pub event_type: String,
    pub aggregate_id: DieselUlid,
    pub aggregate_type: String,
    pub payload: Value,
    pub metadata: Value,
    pub processed: bool,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
}

impl Event {
    pub fn metadata(&self) -> EventMetadata {
        EventMetadata::from_json(&self.metadata)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::events)]
pub struct NewEvent {
    pub id: DieselUlid,
    pub event_type: String,
    pub aggregate_id: DieselUlid,
    pub aggregate_type: String,
    pub payload: Value,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
}

impl NewEvent {
    pub fn new(event_type: impl Into<String>, aggregate_type: impl Into<String>, aggregate_id: DieselUlid, payload: Value) -> Self {
        Self {
            id: DieselUlid::new(),
            event_type: event_type.into(),
            aggregate_type: aggregate_type.into(),
            aggregate_id,
            payload,
            metadata: EventMetadata::default().to_json(),
            created_at: Utc::now(),
            created_by: None,
        }
    }
}

/// An Event copied aside after exhausting its retry budget so the main
/// event log can keep making progress (spec.md §3, §4.2).
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::event_dead_letters)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EventDeadLetter {
    pub id: DieselUlid,
    pub event_id: DieselUlid,
    pub event_type: String,
    pub payload: Value,
    pub error_message: String,
    pub retry_count: i32,
    pub original_created_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::event_dead_letters)]
pub struct NewEventDeadLetter {
    pub id: DieselUlid,
    pub event_id: DieselUlid,
    pub event_type: String,
    pub payload: Value,
    pub error_message: String,
    pub retry_count: i32,
    pub original_created_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl NewEventDeadLetter {
    pub fn from_event(event: &Event, error_message: String, retry_count: i32) -> Self {
        Self {
            id: DieselUlid::new(),
            event_id: event.id,
            event_type: event.event_type.clone(),
            payload: event.payload.clone(),
            error_message,
            retry_count,
            original_created_at: event.created_at,
            created_at: Utc::now(),
        }
    }
}
