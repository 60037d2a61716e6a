use chrono::{NaiveDate, DateTime, Utc};
use diesel::prelude::*;

use super::DieselUlid;

/// Per-user, per-day send counter backing the daily-limit gate of the Send
/// Pipeline (spec.md §4.1). The hourly gate is deliberately NOT a column
/// here: per SPEC_FULL.md's Open Question resolution, "hourly" is a
/// rolling 60-minute window counted by querying `messages` at gate-check
/// time, not a bucket that resets on the clock hour, so there is nothing
/// to persist for it beyond the limit itself.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::user_message_budget)]
#[diesel(primary_key(user_id, date))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Budget {
    pub user_id: DieselUlid,
    pub date: NaiveDate,
    pub messages_sent: i32,
    pub last_message_at: Option<DateTime<Utc>>,
    pub daily_limit: i32,
    pub hourly_limit: i32,
    pub quiet_hours_enabled: bool,
}

impl Budget {
    pub fn daily_limit_reached(&self) -> bool {
        self.messages_sent >= self.daily_limit
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::user_message_budget)]
pub struct NewBudget {
    pub user_id: DieselUlid,
    pub date: NaiveDate,
    pub messages_sent: i32,
    pub daily_limit: i32,
    pub hourly_limit: i32,
    pub quiet_hours_enabled: bool,
}
