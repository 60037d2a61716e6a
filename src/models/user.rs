use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::DieselUlid;

/// A recipient of outbound SMS traffic.
///
/// `quiet_hours_{start,end}_minute` are minutes-since-midnight in the user's
/// own `timezone`, matching spec.md's `[start, end)` local-time window.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: DieselUlid,
    pub phone_number: String,
    pub timezone: String,
    pub quiet_hours_start_minute: i32,
    pub quiet_hours_end_minute: i32,
    pub best_hours: Option<Vec<Option<i32>>>,
    pub best_weekdays: Option<Vec<Option<i32>>>,
    pub avg_response_latency_seconds: Option<i32>,
    pub engagement_score: Option<f64>,
    pub verified: bool,
    pub point_of_contact_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub id: DieselUlid,
    pub phone_number: String,
    pub timezone: String,
    pub quiet_hours_start_minute: i32,
    pub quiet_hours_end_minute: i32,
    pub verified: bool,
    pub point_of_contact_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-user send-time preferences learned from prior engagement, or `None`
/// when there isn't yet enough history to learn one.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponsePattern {
    pub best_hours: Vec<u32>,
    pub best_weekdays: Vec<u32>,
    pub avg_response_latency_seconds: Option<i32>,
    pub engagement_score: Option<f64>,
}

impl User {
    pub fn quiet_hours(&self) -> (i32, i32) {
        (self.quiet_hours_start_minute, self.quiet_hours_end_minute)
    }

    pub fn response_pattern(&self) -> Option<ResponsePattern> {
        let best_hours: Vec<u32> = self
            .best_hours
            .as_ref()?
            .iter()
            .filter_map(|h| *h)
            .map(|h| h as u32)
            .collect();
        let best_weekdays: Vec<u32> = self
            .best_weekdays
            .as_ref()
            .map(|days| days.iter().filter_map(|d| *d).map(|d| d as u32).collect())
            .unwrap_or_default();

        if best_hours.is_empty() && best_weekdays.is_empty() {
            return None;
        }

        Some(ResponsePattern {
            best_hours,
            best_weekdays,
            avg_response_latency_seconds: self.avg_response_latency_seconds,
            engagement_score: self.engagement_score,
        })
    }
}
