pub mod builtin;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::Text;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::config::EventsConfig;
use crate::database::DbPool;
use crate::models::{DieselUlid, Event, NewEventDeadLetter};
use crate::schema::{event_dead_letters, events};

pub use error::EventProcessorError;
pub use handlers::{EventHandler, EventHandlerRegistry, HandlerError};

/// Outcome of handing one claimed `Event` to its registered handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Processed,
    Retrying,
    DeadLettered,
}

/// Running counters surfaced on the health endpoint (spec.md §6), grounded
/// in a `WorkerStats`-style accumulator.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventProcessorStats {
    pub processed: u64,
    pub retried: u64,
    pub dead_lettered: u64,
}

pub struct EventProcessor {
    pool: DbPool,
    config: EventsConfig,
    registry: Arc<EventHandlerRegistry>,
    clock: Arc<dyn Clock>,
    stats: std::sync::Mutex<EventProcessorStats>,
    last_poll_error: std::sync::Mutex<Option<String>>,
}

impl EventProcessor {
    pub fn new(pool: DbPool, config: EventsConfig, registry: Arc<EventHandlerRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            config,
            registry,
            clock,
            stats: std::sync::Mutex::new(EventProcessorStats::default()),
            last_poll_error: std::sync::Mutex::new(None),
        }
    }

    pub fn register(&self, event_type: impl Into<String>, handler: Arc<dyn EventHandler>) {
        self.registry.register(event_type, handler);
    }

    pub fn stats(&self) -> EventProcessorStats {
        *self.stats.lock().expect("event processor stats lock poisoned")
    }

    /// Backs `/health` (spec.md §6/§7): `Some(_)` once the most recent poll
    /// tick failed outright (store unreachable, poll task panicked), and
    /// cleared again the moment a tick succeeds.
    pub fn last_poll_error(&self) -> Option<String> {
        self.last_poll_error.lock().expect("event processor poll-error lock poisoned").clone()
    }

    pub fn registered_event_types(&self) -> Vec<String> {
        self.registry.registered_event_types()
    }

    /// Prunes `event_dead_letters` rows older than
    /// `dead_letter_retention_days`. Supplemented beyond spec.md (see
    /// SPEC_FULL.md), grounded in a `DatabaseQueueDriver::cleanup_completed_jobs`-style
    /// maintenance-sweep pattern. The originating `events` row is never touched here — it
    /// already carries `processed=true` from the dead-letter handoff itself.
    pub fn cleanup_stale_dead_letters(&self) -> Result<u64, EventProcessorError> {
        let mut conn = self.pool.get().map_err(crate::error::StoreError::from)?;
        let cutoff = self.clock.now() - Duration::days(self.config.dead_letter_retention_days);
        let deleted = diesel::delete(event_dead_letters::table.filter(event_dead_letters::created_at.lt(cutoff))).execute(&mut conn)?;
        Ok(deleted as u64)
    }

    /// spec.md §4.2 `poll()`: read-only view of the next batch of due,
    /// unprocessed events, FIFO by `created_at` within the batch.
    pub fn poll(&self) -> Result<Vec<Event>, EventProcessorError> {
        let mut conn = self.pool.get().map_err(crate::error::StoreError::from)?;
        self.poll_with(&mut conn, self.clock.now())
    }

    fn poll_with(&self, conn: &mut PgConnection, now: DateTime<Utc>) -> Result<Vec<Event>, EventProcessorError> {
        let candidates: Vec<Event> = events::table
            .filter(events::processed.eq(false))
            .order(events::created_at.asc())
            .limit(self.config.batch_size)
            .load(conn)?;

        Ok(candidates
            .into_iter()
            .filter(|event| event.metadata().not_before.map(|not_before| not_before <= now).unwrap_or(true))
            .collect())
    }

    /// spec.md §4.2 `process(event_id)`: claims the row with
    /// `FOR UPDATE SKIP LOCKED` (the same claiming query shape a
    /// `DatabaseQueueDriver::pop` uses) so two workers racing on
    /// the same event never both run its handlers, then dispatches to every
    /// handler registered for `event.event_type`.
    pub fn process(&self, event_id: DieselUlid) -> Result<ProcessOutcome, EventProcessorError> {
        let mut conn = self.pool.get().map_err(crate::error::StoreError::from)?;
        let now = self.clock.now();
        conn.transaction(|conn| self.process_claimed(conn, event_id, now, false))
    }

    /// spec.md §4.2 `force_process(event_id)`: identical to `process`, but
    /// ignores `metadata.not_before` so an operator can push a backed-off
    /// event through immediately via the force-process HTTP endpoint.
    pub fn force_process(&self, event_id: DieselUlid) -> Result<ProcessOutcome, EventProcessorError> {
        let mut conn = self.pool.get().map_err(crate::error::StoreError::from)?;
        let now = self.clock.now();
        conn.transaction(|conn| self.process_claimed(conn, event_id, now, true))
    }

    fn process_claimed(
        &self,
        conn: &mut PgConnection,
        event_id: DieselUlid,
        now: DateTime<Utc>,
        force: bool,
    ) -> Result<ProcessOutcome, EventProcessorError> {
        let claimed: Option<Event> = sql_query("SELECT * FROM events WHERE id = $1 FOR UPDATE SKIP LOCKED")
            .bind::<Text, _>(event_id.to_string())
            .get_result(conn)
            .optional()?;

        let Some(event) = claimed else {
            return Err(EventProcessorError::NotFound(event_id));
        };
        if event.processed {
            return Err(EventProcessorError::AlreadyProcessed(event.id));
        }
        let mut metadata = event.metadata();
        if !force {
            if let Some(not_before) = metadata.not_before {
                if not_before > now {
                    return Ok(ProcessOutcome::Retrying);
                }
            }
        }

        let handlers = self.registry.handlers_for(&event.event_type);
        let mut failure: Option<String> = None;
        for handler in &handlers {
            if let Err(err) = futures::executor::block_on(handler.handle(event.aggregate_id, &event.payload)) {
                failure = Some(err.0);
                break;
            }
        }

        match failure {
            None => {
                diesel::update(events::table.find(event.id))
                    .set((events::processed.eq(true), events::processed_at.eq(now)))
                    .execute(conn)?;
                self.stats.lock().expect("event processor stats lock poisoned").processed += 1;
                Ok(ProcessOutcome::Processed)
            }
            Some(error_message) => {
                metadata.retry_count += 1;
                metadata.last_error = Some(error_message.clone());

                if metadata.retry_count >= self.config.max_retries {
                    let dead_letter = NewEventDeadLetter::from_event(&event, error_message, metadata.retry_count as i32);
                    diesel::insert_into(event_dead_letters::table).values(&dead_letter).execute(conn)?;
                    // spec.md §4.2: move to DeadLetter AND mark the original processed —
                    // the row stays (I4: processed is terminal, never deleted).
                    diesel::update(events::table.find(event.id))
                        .set((events::processed.eq(true), events::processed_at.eq(now), events::metadata.eq(metadata.to_json())))
                        .execute(conn)?;
                    self.stats.lock().expect("event processor stats lock poisoned").dead_lettered += 1;
                    warn!(event_id = %event.id, event_type = %event.event_type, "event exhausted retries, moved to dead letter");
                    Ok(ProcessOutcome::DeadLettered)
                } else {
                    metadata.not_before = Some(now + Duration::seconds(self.config.retry_delay_seconds as i64 * 2i64.pow(metadata.retry_count)));
                    diesel::update(events::table.find(event.id)).set(events::metadata.eq(metadata.to_json())).execute(conn)?;
                    self.stats.lock().expect("event processor stats lock poisoned").retried += 1;
                    Ok(ProcessOutcome::Retrying)
                }
            }
        }
    }

    /// One poll-and-process tick, returning how many events were advanced.
    pub fn run_once(&self) -> Result<usize, EventProcessorError> {
        let due = self.poll()?;
        let mut advanced = 0;
        for event in due {
            match self.process(event.id) {
                Ok(_) => advanced += 1,
                Err(err) => error!(event_id = %event.id, error = %err, "event processing failed"),
            }
        }
        Ok(advanced)
    }

    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(self.config.poll_interval_seconds));
        // Dead-letter pruning doesn't need to race the claim loop; once an
        // hour is plenty to keep the table from growing unbounded.
        let mut maintenance = tokio::time::interval(std::time::Duration::from_secs(3600));
        maintenance.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let processor = self.clone();
                    let result = tokio::task::spawn_blocking(move || processor.run_once()).await;
                    let mut last_poll_error = self.last_poll_error.lock().expect("event processor poll-error lock poisoned");
                    match result {
                        Ok(Ok(advanced)) => {
                            *last_poll_error = None;
                            if advanced > 0 {
                                info!(advanced, "event processor poll tick advanced events");
                            }
                        }
                        Ok(Err(err)) => {
                            *last_poll_error = Some(err.to_string());
                            error!(error = %err, "event processor poll tick failed");
                        }
                        Err(join_err) => {
                            *last_poll_error = Some(join_err.to_string());
                            error!(error = %join_err, "event processor poll tick panicked");
                        }
                    }
                }
                _ = maintenance.tick() => {
                    let processor = self.clone();
                    let result = tokio::task::spawn_blocking(move || processor.cleanup_stale_dead_letters()).await;
                    match result {
                        Ok(Ok(deleted)) if deleted > 0 => info!(deleted, "event processor pruned stale dead letters"),
                        Ok(Ok(_)) => {}
                        Ok(Err(err)) => error!(error = %err, "event processor maintenance sweep failed"),
                        Err(join_err) => error!(error = %join_err, "event processor maintenance sweep panicked"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        warn!("event processor poller shutting down");
                        break;
                    }
                }
            }
        }
    }
}
