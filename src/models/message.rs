use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::DieselUlid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    Inbound,
    Outbound,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::Inbound => "inbound",
            MessageRole::Outbound => "outbound",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "inbound" => MessageRole::Inbound,
            _ => MessageRole::Outbound,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    QueuedForSend,
    Sent,
    Delivered,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::QueuedForSend => "queued_for_send",
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "queued_for_send" => MessageStatus::QueuedForSend,
            "sent" => MessageStatus::Sent,
            "delivered" => MessageStatus::Delivered,
            "failed" => MessageStatus::Failed,
            _ => MessageStatus::Pending,
        }
    }
}

/// One turn in a user's conversation. Inbound rows double as activity
/// witnesses for `is_user_active`; outbound rows are what the Orchestrator's
/// Send Pipeline produces and what the SMS Dispatcher boundary advances
/// through `queued_for_send` → `sent`/`failed`.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, QueryableByName, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Message {
    pub id: DieselUlid,
    pub user_id: DieselUlid,
    pub role: String,
    pub direction: String,
    pub content: String,
    pub status: String,
    pub provider_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn status(&self) -> MessageStatus {
        MessageStatus::from_str(&self.status)
    }

    pub fn role(&self) -> MessageRole {
        MessageRole::from_str(&self.role)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::messages)]
pub struct NewMessage {
    pub id: DieselUlid,
    pub user_id: DieselUlid,
    pub role: String,
    pub direction: String,
    pub content: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewMessage {
    pub fn outbound_pending(user_id: DieselUlid, content: String) -> Self {
        let now = Utc::now();
        Self {
            id: DieselUlid::new(),
            user_id,
            role: MessageRole::Outbound.as_str().to_string(),
            direction: "outbound".to_string(),
            content,
            status: MessageStatus::Pending.as_str().to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}
