use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::BigInt;

use crate::app::relevance::{RelevanceClassifier, RelevanceVerdict};
use crate::app::renderer::{Renderer, UserContext};
use crate::config::OrchestratorConfig;
use crate::models::{
    Budget, DieselUlid, MessageRole, NewBudget, NewEvent, NewMessage, Priority, QueuedMessage, QueuedMessageStatus, User,
};
use crate::schema::{events, message_queue, messages, user_message_budget, users};

use super::advisory_lock::advisory_lock_key;
use super::error::OrchestratorError;
use super::optimal_send_time::{compute_optimal_send_time, is_within_quiet_hours, next_local_day_at, next_quiet_hours_end};

const ACTIVE_WINDOW_MINUTES: i64 = 10;
const MAX_RENDER_RETRIES: i32 = 3;
const RENDER_RETRY_DELAY_SECONDS: i64 = 60;
const MAX_RENDERED_CHARS: usize = 1600;

/// What happened to one QueuedMessage after one Send Pipeline run.
#[derive(Debug, Clone)]
pub enum GateOutcome {
    Sent { message_id: DieselUlid },
    Rescheduled { to: DateTime<Utc> },
    Superseded { reason: String },
    Failed { reason: String },
    Skipped,
}

/// Runs the nine-gate Send Pipeline for a single QueuedMessage inside one
/// `pg_advisory_xact_lock`-guarded transaction (spec.md §4.1, §5).
///
/// `renderer`/`relevance` are invoked through `futures::executor::block_on`:
/// diesel's transaction closure is synchronous, so the alternative would be
/// to split the transaction around every external call, re-checking gates
/// each time. We accept holding the transaction open across one render/
/// relevance round-trip per message as a deliberate simplification (see
/// DESIGN.md) in exchange for the whole pipeline being provably atomic.
pub fn run_send_pipeline(
    conn: &mut PgConnection,
    queued_message_id: DieselUlid,
    config: &OrchestratorConfig,
    renderer: &dyn Renderer,
    relevance: &dyn RelevanceClassifier,
    now: DateTime<Utc>,
) -> Result<GateOutcome, OrchestratorError> {
    conn.transaction(|conn| run_send_pipeline_tx(conn, queued_message_id, config, renderer, relevance, now))
}

fn run_send_pipeline_tx(
    conn: &mut PgConnection,
    queued_message_id: DieselUlid,
    config: &OrchestratorConfig,
    renderer: &dyn Renderer,
    relevance: &dyn RelevanceClassifier,
    now: DateTime<Utc>,
) -> Result<GateOutcome, OrchestratorError> {
    let qm: QueuedMessage = message_queue::table.find(queued_message_id).first(conn)?;

    // Gate 1: staleness/supersession.
    if qm.status() != QueuedMessageStatus::Queued {
        return Ok(GateOutcome::Skipped);
    }

    let user: User = users::table.find(qm.user_id).first(conn)?;
    let tz: chrono_tz::Tz = user.timezone.parse().unwrap_or(chrono_tz::UTC);
    let priority = qm.priority();

    sql_query("SELECT pg_advisory_xact_lock($1)")
        .bind::<BigInt, _>(advisory_lock_key(qm.user_id))
        .execute(conn)?;

    // Re-read after acquiring the lock: another worker may have already
    // claimed/superseded this row while we were waiting.
    let qm: QueuedMessage = message_queue::table.find(queued_message_id).first(conn)?;
    if qm.status() != QueuedMessageStatus::Queued {
        return Ok(GateOutcome::Skipped);
    }

    let today = now.with_timezone(&tz).date_naive();
    let budget = load_or_create_budget(conn, qm.user_id, today, config)?;

    // Gate 2: daily budget. Urgent priority does NOT bypass this one
    // (spec.md §9 Open Questions: "forbids bypass of the daily limit").
    if budget.daily_limit_reached() {
        let reschedule_to = next_local_day_at(now, tz, 8, 0);
        reschedule(conn, qm.id, reschedule_to, now)?;
        return Ok(GateOutcome::Rescheduled { to: reschedule_to });
    }

    let active = is_user_active_at(conn, qm.user_id, now)?;

    // Gate 3: hourly budget (rolling window), bypassed by urgent.
    if priority != Priority::Urgent {
        let window_start = now - Duration::minutes(config.hourly_window_minutes);
        let sent_in_window = count_outbound_since(conn, qm.user_id, window_start)?;
        if sent_in_window >= budget.hourly_limit as i64 && !active {
            let oldest = oldest_outbound_since(conn, qm.user_id, window_start)?;
            let reschedule_to = match oldest {
                Some(oldest_created_at) => {
                    let elapsed = now - oldest_created_at;
                    let remaining = Duration::minutes(config.hourly_window_minutes) - elapsed;
                    now + remaining.max(Duration::minutes(1))
                }
                None => now + Duration::minutes(config.hourly_window_minutes),
            };
            reschedule(conn, qm.id, reschedule_to, now)?;
            return Ok(GateOutcome::Rescheduled { to: reschedule_to });
        }
    }

    // Gate 4: quiet hours, bypassed by urgent.
    if priority != Priority::Urgent {
        let local_now = now.with_timezone(&tz);
        let minute_of_day = local_now.hour() as i32 * 60 + local_now.minute() as i32;
        if is_within_quiet_hours(minute_of_day, user.quiet_hours_start_minute, user.quiet_hours_end_minute) && !active {
            let quiet_end = next_quiet_hours_end(now, tz, user.quiet_hours_end_minute);
            let reschedule_to = compute_optimal_send_time(
                quiet_end,
                user.response_pattern().as_ref(),
                priority,
                tz,
                user.quiet_hours_start_minute,
                user.quiet_hours_end_minute,
            );
            reschedule(conn, qm.id, reschedule_to, now)?;
            return Ok(GateOutcome::Rescheduled { to: reschedule_to });
        }
    }

    // Gate 6: relevance (optional).
    let mut contextual_preamble = false;
    if qm.requires_fresh_context {
        let recent = recent_message_contents(conn, qm.user_id, 20)?;
        let elapsed = now - qm.created_at;
        let verdict = futures::executor::block_on(relevance.classify(&qm.payload, &recent, elapsed))?;
        match verdict {
            RelevanceVerdict::Stale => {
                supersede_row(conn, qm.id, "stale".to_string(), now)?;
                insert_event(
                    conn,
                    "message.superseded",
                    "queued_message",
                    qm.id,
                    serde_json::json!({ "reason": "stale" }),
                    now,
                )?;
                return Ok(GateOutcome::Superseded { reason: "stale".to_string() });
            }
            RelevanceVerdict::Contextual => contextual_preamble = true,
            RelevanceVerdict::Relevant => {}
        }
    }

    // Gate 7: render (at most once per QueuedMessage — I6).
    let rendered = match &qm.rendered_text {
        Some(existing) => existing.clone(),
        None => {
            let context = UserContext {
                user_id: qm.user_id,
                recent_messages: recent_message_contents(conn, qm.user_id, 20)?,
            };
            match futures::executor::block_on(renderer.render(&qm.payload, &context)) {
                Ok(mut text) => {
                    if contextual_preamble {
                        text = format!("(quick update) {text}");
                    }
                    if text.chars().count() > MAX_RENDERED_CHARS {
                        text = text.chars().take(MAX_RENDERED_CHARS).collect();
                    }
                    persist_rendered_text(conn, qm.id, &text, now)?;
                    text
                }
                Err(err) => {
                    let retry_count = bump_render_retry(conn, qm.id, now)?;
                    if retry_count >= MAX_RENDER_RETRIES {
                        fail_queued_message(conn, qm.id, format!("render failed: {err}"), now)?;
                        insert_event(
                            conn,
                            "message.render_failed",
                            "queued_message",
                            qm.id,
                            serde_json::json!({ "error": err.to_string() }),
                            now,
                        )?;
                        return Ok(GateOutcome::Failed { reason: err.to_string() });
                    }
                    let reschedule_to = now + Duration::seconds(RENDER_RETRY_DELAY_SECONDS);
                    reschedule(conn, qm.id, reschedule_to, now)?;
                    return Ok(GateOutcome::Rescheduled { to: reschedule_to });
                }
            }
        }
    };

    // Gate 8: dispatch. A failed insert here aborts the whole transaction
    // and surfaces as an `OrchestratorError` to the caller; the QueuedMessage
    // stays `queued` at its current `scheduled_for` and is retried on the
    // next `process_due` cycle rather than inline (a documented
    // simplification of the literal 1s/2s/4s backoff — see DESIGN.md).
    let message_id = insert_outbound_message(conn, qm.user_id, &rendered, now)?;

    // Gate 9: commit.
    mark_sent(conn, qm.id, message_id, now)?;
    increment_budget(conn, qm.user_id, today, now)?;

    Ok(GateOutcome::Sent { message_id })
}

pub fn is_user_active_at(conn: &mut PgConnection, user_id: DieselUlid, now: DateTime<Utc>) -> Result<bool, diesel::result::Error> {
    let cutoff = now - Duration::minutes(ACTIVE_WINDOW_MINUTES);
    let count: i64 = messages::table
        .filter(messages::user_id.eq(user_id))
        .filter(messages::role.eq(MessageRole::Inbound.as_str()))
        .filter(messages::created_at.ge(cutoff))
        .count()
        .get_result(conn)?;
    Ok(count > 0)
}

// Counted by `created_at` (the moment gate 8 inserted the row), not
// `sent_at`: an outbound Message is `pending` with `sent_at = NULL` until
// the Dispatcher confirms it, so counting by `sent_at` would leave every
// message inserted earlier in the same `process_due` batch invisible to
// this gate and let the hourly limit go unenforced within a batch.
fn count_outbound_since(conn: &mut PgConnection, user_id: DieselUlid, since: DateTime<Utc>) -> Result<i64, diesel::result::Error> {
    messages::table
        .filter(messages::user_id.eq(user_id))
        .filter(messages::role.eq(MessageRole::Outbound.as_str()))
        .filter(messages::created_at.ge(since))
        .count()
        .get_result(conn)
}

fn oldest_outbound_since(
    conn: &mut PgConnection,
    user_id: DieselUlid,
    since: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, diesel::result::Error> {
    messages::table
        .filter(messages::user_id.eq(user_id))
        .filter(messages::role.eq(MessageRole::Outbound.as_str()))
        .filter(messages::created_at.ge(since))
        .order(messages::created_at.asc())
        .select(messages::created_at)
        .first::<DateTime<Utc>>(conn)
        .optional()
}

fn recent_message_contents(conn: &mut PgConnection, user_id: DieselUlid, limit: i64) -> Result<Vec<String>, diesel::result::Error> {
    let mut rows = messages::table
        .filter(messages::user_id.eq(user_id))
        .order(messages::created_at.desc())
        .limit(limit)
        .select(messages::content)
        .load::<String>(conn)?;
    rows.reverse();
    Ok(rows)
}

fn load_or_create_budget(
    conn: &mut PgConnection,
    user_id: DieselUlid,
    date: NaiveDate,
    config: &OrchestratorConfig,
) -> Result<Budget, diesel::result::Error> {
    if let Some(existing) = user_message_budget::table.find((user_id, date)).first::<Budget>(conn).optional()? {
        return Ok(existing);
    }
    let new_budget = NewBudget {
        user_id,
        date,
        messages_sent: 0,
        daily_limit: config.default_daily_limit,
        hourly_limit: config.default_hourly_limit,
        quiet_hours_enabled: true,
    };
    diesel::insert_into(user_message_budget::table)
        .values(&new_budget)
        .on_conflict_do_nothing()
        .execute(conn)?;
    user_message_budget::table.find((user_id, date)).first(conn)
}

fn reschedule(conn: &mut PgConnection, id: DieselUlid, to: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), diesel::result::Error> {
    diesel::update(message_queue::table.find(id))
        .set((message_queue::scheduled_for.eq(to), message_queue::updated_at.eq(now)))
        .execute(conn)?;
    Ok(())
}

fn supersede_row(conn: &mut PgConnection, id: DieselUlid, reason: String, now: DateTime<Utc>) -> Result<(), diesel::result::Error> {
    diesel::update(message_queue::table.find(id).filter(message_queue::status.eq(QueuedMessageStatus::Queued.as_str())))
        .set((
            message_queue::status.eq(QueuedMessageStatus::Superseded.as_str()),
            message_queue::superseded_reason.eq(Some(reason)),
            message_queue::updated_at.eq(now),
        ))
        .execute(conn)?;
    Ok(())
}

fn persist_rendered_text(conn: &mut PgConnection, id: DieselUlid, text: &str, now: DateTime<Utc>) -> Result<(), diesel::result::Error> {
    diesel::update(message_queue::table.find(id))
        .set((message_queue::rendered_text.eq(text), message_queue::updated_at.eq(now)))
        .execute(conn)?;
    Ok(())
}

fn bump_render_retry(conn: &mut PgConnection, id: DieselUlid, now: DateTime<Utc>) -> Result<i32, diesel::result::Error> {
    diesel::update(message_queue::table.find(id))
        .set((
            message_queue::render_retry_count.eq(message_queue::render_retry_count + 1),
            message_queue::updated_at.eq(now),
        ))
        .execute(conn)?;
    message_queue::table.find(id).select(message_queue::render_retry_count).first(conn)
}

fn fail_queued_message(conn: &mut PgConnection, id: DieselUlid, reason: String, now: DateTime<Utc>) -> Result<(), diesel::result::Error> {
    diesel::update(message_queue::table.find(id))
        .set((
            message_queue::status.eq(QueuedMessageStatus::Failed.as_str()),
            message_queue::superseded_reason.eq(Some(reason)),
            message_queue::updated_at.eq(now),
        ))
        .execute(conn)?;
    Ok(())
}

fn insert_outbound_message(
    conn: &mut PgConnection,
    user_id: DieselUlid,
    content: &str,
    now: DateTime<Utc>,
) -> Result<DieselUlid, diesel::result::Error> {
    let mut new_message = NewMessage::outbound_pending(user_id, content.to_string());
    new_message.created_at = now;
    new_message.updated_at = now;
    let id = new_message.id;
    diesel::insert_into(messages::table).values(&new_message).execute(conn)?;
    Ok(id)
}

/// Eventually-consistent with the Message's own lifecycle: `QueuedMessage`
/// becomes `sent` as soon as the outbound Message is handed to the
/// Dispatcher (spec.md §4.1 gate 9), while the Message row itself is still
/// `pending` at that instant and only reaches `sent` once the Dispatcher
/// (src/app/dispatcher) observes the provider's response — mirroring how
/// I3's budget-count invariant is also only eventually consistent.
fn mark_sent(conn: &mut PgConnection, id: DieselUlid, message_id: DieselUlid, now: DateTime<Utc>) -> Result<(), diesel::result::Error> {
    diesel::update(message_queue::table.find(id))
        .set((
            message_queue::status.eq(QueuedMessageStatus::Sent.as_str()),
            message_queue::delivered_message_id.eq(Some(message_id)),
            message_queue::updated_at.eq(now),
        ))
        .execute(conn)?;
    Ok(())
}

fn increment_budget(conn: &mut PgConnection, user_id: DieselUlid, date: NaiveDate, now: DateTime<Utc>) -> Result<(), diesel::result::Error> {
    diesel::update(user_message_budget::table.find((user_id, date)))
        .set((
            user_message_budget::messages_sent.eq(user_message_budget::messages_sent + 1),
            user_message_budget::last_message_at.eq(Some(now)),
        ))
        .execute(conn)?;
    Ok(())
}

fn insert_event(
    conn: &mut PgConnection,
    event_type: &str,
    aggregate_type: &str,
    aggregate_id: DieselUlid,
    payload: serde_json::Value,
    now: DateTime<Utc>,
) -> Result<(), diesel::result::Error> {
    let mut new_event = NewEvent::new(event_type, aggregate_type, aggregate_id, payload);
    new_event.created_at = now;
    diesel::insert_into(events::table).values(&new_event).execute(conn)?;
    Ok(())
}
