use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{DieselUlid, Priority};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuedMessageStatus {
    Queued,
    Approved,
    Sent,
    Superseded,
    Cancelled,
    Failed,
}

impl QueuedMessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueuedMessageStatus::Queued => "queued",
            QueuedMessageStatus::Approved => "approved",
            QueuedMessageStatus::Sent => "sent",
            QueuedMessageStatus::Superseded => "superseded",
            QueuedMessageStatus::Cancelled => "cancelled",
            QueuedMessageStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "approved" => QueuedMessageStatus::Approved,
            "sent" => QueuedMessageStatus::Sent,
            "superseded" => QueuedMessageStatus::Superseded,
            "cancelled" => QueuedMessageStatus::Cancelled,
            "failed" => QueuedMessageStatus::Failed,
            _ => QueuedMessageStatus::Queued,
        }
    }
}

/// Structured, producer-defined message request. Modeled as a tagged
/// variant per the duck-typed-payloads design notes (spec.md §9): unknown
/// `type` tags deserialize into `Other` and route to a default renderer,
/// logging a warning, rather than failing to parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueuedMessagePayload {
    Welcome {
        #[serde(default)]
        persona: Option<String>,
    },
    SolutionUpdate {
        topic: String,
        summary: String,
    },
    IntroOpportunity {
        topic: String,
        contact_name: String,
    },
    WeeklySummary {
        highlights: Vec<String>,
    },
    PaymentRequired {
        amount_cents: i64,
        currency: String,
    },
    #[serde(other)]
    Other,
}

impl QueuedMessagePayload {
    /// `same payload.type + payload.topic` is the "same semantic slot" test
    /// spec.md §4.1 Superseding uses to decide whether a newer payload
    /// addresses the same thing as an older one.
    pub fn semantic_slot(&self) -> (&'static str, Option<&str>) {
        match self {
            QueuedMessagePayload::Welcome { .. } => ("welcome", None),
            QueuedMessagePayload::SolutionUpdate { topic, .. } => ("solution_update", Some(topic.as_str())),
            QueuedMessagePayload::IntroOpportunity { topic, .. } => ("intro_opportunity", Some(topic.as_str())),
            QueuedMessagePayload::WeeklySummary { .. } => ("weekly_summary", None),
            QueuedMessagePayload::PaymentRequired { .. } => ("payment_required", None),
            QueuedMessagePayload::Other => ("other", None),
        }
    }

    pub fn type_tag(&self) -> &'static str {
        self.semantic_slot().0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::message_queue)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct QueuedMessage {
    pub id: DieselUlid,
    pub user_id: DieselUlid,
    pub producer_id: String,
    pub payload: Value,
    pub rendered_text: Option<String>,
    pub priority: String,
    pub scheduled_for: DateTime<Utc>,
    pub status: String,
    pub requires_fresh_context: bool,
    pub supersedes_of: Option<DieselUlid>,
    pub superseded_reason: Option<String>,
    pub delivered_message_id: Option<DieselUlid>,
    pub idempotency_key: Option<String>,
    pub render_retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueuedMessage {
    pub fn status(&self) -> QueuedMessageStatus {
        QueuedMessageStatus::from_str(&self.status)
    }

    pub fn priority(&self) -> Priority {
        Priority::from_str(&self.priority)
    }

    pub fn parsed_payload(&self) -> QueuedMessagePayload {
        serde_json::from_value(self.payload.clone()).unwrap_or(QueuedMessagePayload::Other)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::message_queue)]
pub struct NewQueuedMessage {
    pub id: DieselUlid,
    pub user_id: DieselUlid,
    pub producer_id: String,
    pub payload: Value,
    pub priority: String,
    pub scheduled_for: DateTime<Utc>,
    pub status: String,
    pub requires_fresh_context: bool,
    pub supersedes_of: Option<DieselUlid>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The request shape of the Enqueue API (spec.md §6).
#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub user_id: DieselUlid,
    pub producer_id: String,
    pub payload: Value,
    pub priority: Priority,
    pub can_delay: bool,
    pub requires_fresh_context: bool,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub idempotency_key: Option<String>,
    pub supersedes_of: Option<DieselUlid>,
}

impl NewQueuedMessage {
    pub fn from_request(request: EnqueueRequest) -> Self {
        let now = Utc::now();
        Self {
            id: DieselUlid::new(),
            user_id: request.user_id,
            producer_id: request.producer_id,
            payload: request.payload,
            priority: request.priority.as_str().to_string(),
            scheduled_for: request.scheduled_for.unwrap_or(now),
            status: QueuedMessageStatus::Queued.as_str().to_string(),
            requires_fresh_context: request.requires_fresh_context,
            supersedes_of: request.supersedes_of,
            idempotency_key: request.idempotency_key,
            created_at: now,
            updated_at: now,
        }
    }
}
