use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::DieselUlid;
use super::Priority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "processing" => TaskStatus::Processing,
            "completed" => TaskStatus::Completed,
            "failed" => TaskStatus::Failed,
            _ => TaskStatus::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// A scheduled unit of agent work (spec.md §3, §4.3).
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, QueryableByName, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::agent_tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Task {
    pub id: DieselUlid,
    pub task_type: String,
    pub agent_type: String,
    pub user_id: Option<DieselUlid>,
    pub context: Value,
    pub scheduled_for: DateTime<Utc>,
    pub priority: String,
    pub status: String,
    pub retry_count: i32,
    pub max_retries: i32,
    pub last_attempted_at: Option<DateTime<Utc>>,
    pub result: Option<Value>,
    pub error_log: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn status(&self) -> TaskStatus {
        TaskStatus::from_str(&self.status)
    }

    pub fn priority(&self) -> Priority {
        Priority::from_str(&self.priority)
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// `60 * 2^retry_count` seconds, per spec.md §4.3 (1, 2, 4 minutes).
    pub fn next_retry_delay_seconds(&self) -> i64 {
        60 * 2i64.pow(self.retry_count as u32)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::agent_tasks)]
pub struct NewTask {
    pub id: DieselUlid,
    pub task_type: String,
    pub agent_type: String,
    pub user_id: Option<DieselUlid>,
    pub context: Value,
    pub scheduled_for: DateTime<Utc>,
    pub priority: String,
    pub status: String,
    pub max_retries: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateTask {
    pub task_type: String,
    pub agent_type: String,
    pub user_id: Option<DieselUlid>,
    pub context: Value,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub max_retries: i32,
}

impl NewTask {
    pub fn from_create(create: CreateTask) -> Self {
        Self {
            id: DieselUlid::new(),
            task_type: create.task_type,
            agent_type: create.agent_type,
            user_id: create.user_id,
            context: create.context,
            scheduled_for: create.scheduled_for.unwrap_or_else(Utc::now),
            priority: create.priority.as_str().to_string(),
            status: TaskStatus::Pending.as_str().to_string(),
            max_retries: create.max_retries,
            created_at: Utc::now(),
        }
    }
}
