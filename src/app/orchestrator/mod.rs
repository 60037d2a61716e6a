pub mod advisory_lock;
pub mod error;
pub mod optimal_send_time;
pub mod pipeline;

use std::sync::Arc;

use diesel::prelude::*;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::app::relevance::RelevanceClassifier;
use crate::app::renderer::Renderer;
use crate::clock::Clock;
use crate::config::OrchestratorConfig;
use crate::database::DbPool;
use crate::models::{DieselUlid, EnqueueRequest, NewQueuedMessage, QueuedMessage, QueuedMessageStatus};
use crate::schema::{message_queue, users};

pub use error::OrchestratorError;
pub use pipeline::GateOutcome;

/// Owns the Send Pipeline's poll loop and its public operations
/// (spec.md §4.1: `enqueue`, `process_due`, `is_user_active`, `supersede`).
/// `renderer`/`relevance`/`clock` are injected trait objects, never a
/// global/singleton, per spec.md §9's Design Notes.
#[derive(Clone)]
pub struct Orchestrator {
    pool: DbPool,
    config: OrchestratorConfig,
    renderer: Arc<dyn Renderer>,
    relevance: Arc<dyn RelevanceClassifier>,
    clock: Arc<dyn Clock>,
}

impl Orchestrator {
    pub fn new(
        pool: DbPool,
        config: OrchestratorConfig,
        renderer: Arc<dyn Renderer>,
        relevance: Arc<dyn RelevanceClassifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { pool, config, renderer, relevance, clock }
    }

    /// spec.md §4.1 `enqueue(...)`. Idempotency-key collisions are resolved
    /// by the `message_queue.idempotency_key` unique index at the database
    /// layer; a duplicate enqueue returns the existing row's id rather than
    /// erroring, matching I4's "same idempotency key never produces two
    /// sends" invariant.
    pub fn enqueue(&self, request: EnqueueRequest) -> Result<DieselUlid, OrchestratorError> {
        if request.payload.is_null() {
            return Err(OrchestratorError::EmptyPayload);
        }
        let mut conn = self.pool.get().map_err(crate::error::StoreError::from)?;

        let user_exists: bool = diesel::select(diesel::dsl::exists(users::table.find(request.user_id))).get_result(&mut conn)?;
        if !user_exists {
            return Err(OrchestratorError::UserNotFound(request.user_id));
        }

        if let Some(idempotency_key) = request.idempotency_key.clone() {
            let existing: Option<QueuedMessage> = message_queue::table
                .filter(message_queue::producer_id.eq(&request.producer_id))
                .filter(message_queue::idempotency_key.eq(&idempotency_key))
                .first(&mut conn)
                .optional()?;
            if let Some(existing) = existing {
                return Ok(existing.id);
            }
        }

        let new_row = NewQueuedMessage::from_request(request);
        let id = new_row.id;
        diesel::insert_into(message_queue::table)
            .values(&new_row)
            .on_conflict_do_nothing()
            .execute(&mut conn)?;

        info!(queued_message_id = %id, "enqueued message");
        Ok(id)
    }

    /// spec.md §4.1 `process_due()`: claims everything with `scheduled_for
    /// <= now` and `status = 'queued'`, orders it priority-then-time, and
    /// runs the Send Pipeline on up to `batch_size` of them. Returns the
    /// number of rows the pipeline actually advanced (sent, rescheduled,
    /// superseded, or failed — anything that wasn't `Skipped`).
    pub fn process_due(&self) -> Result<usize, OrchestratorError> {
        let now = self.clock.now();
        let mut conn = self.pool.get().map_err(crate::error::StoreError::from)?;

        let mut due: Vec<QueuedMessage> = message_queue::table
            .filter(message_queue::status.eq(QueuedMessageStatus::Queued.as_str()))
            .filter(message_queue::scheduled_for.le(now))
            .order((message_queue::scheduled_for.asc(), message_queue::created_at.asc()))
            .load(&mut conn)?;

        // Stable sort: priority is the primary key, but ties keep the
        // scheduled_for/created_at order the query already established
        // (spec.md §4.1's per-batch FIFO-within-priority ordering).
        due.sort_by_key(|row| row.priority());
        due.truncate(self.config.batch_size as usize);

        let mut advanced = 0usize;
        for row in due {
            match pipeline::run_send_pipeline(&mut conn, row.id, &self.config, self.renderer.as_ref(), self.relevance.as_ref(), now) {
                Ok(GateOutcome::Skipped) => {}
                Ok(outcome) => {
                    advanced += 1;
                    info!(queued_message_id = %row.id, outcome = ?outcome, "send pipeline advanced message");
                }
                Err(err) => {
                    error!(queued_message_id = %row.id, error = %err, "send pipeline run failed, leaving message queued for retry");
                }
            }
        }

        Ok(advanced)
    }

    /// spec.md §4.1 `is_user_active(user_id)`: has this user sent an inbound
    /// message in the last 10 minutes.
    pub fn is_user_active(&self, user_id: DieselUlid) -> Result<bool, OrchestratorError> {
        let mut conn = self.pool.get().map_err(crate::error::StoreError::from)?;
        Ok(pipeline::is_user_active_at(&mut conn, user_id, self.clock.now())?)
    }

    /// spec.md §4.1 `supersede(id, reason, replacement_id)`: marks a queued
    /// message superseded. Only valid while the row is still `queued`;
    /// anything else has already been claimed by the pipeline or resolved.
    pub fn supersede(&self, id: DieselUlid, reason: String, replacement_id: Option<DieselUlid>) -> Result<(), OrchestratorError> {
        let mut conn = self.pool.get().map_err(crate::error::StoreError::from)?;
        let now = self.clock.now();

        let updated = diesel::update(message_queue::table.find(id).filter(message_queue::status.eq(QueuedMessageStatus::Queued.as_str())))
            .set((
                message_queue::status.eq(QueuedMessageStatus::Superseded.as_str()),
                message_queue::superseded_reason.eq(Some(reason)),
                message_queue::updated_at.eq(now),
            ))
            .execute(&mut conn)?;

        if updated == 0 {
            let exists: bool = diesel::select(diesel::dsl::exists(message_queue::table.find(id))).get_result(&mut conn)?;
            return Err(if exists { OrchestratorError::NotQueued(id) } else { OrchestratorError::NotFound(id) });
        }

        if let Some(replacement_id) = replacement_id {
            diesel::update(message_queue::table.find(id))
                .set(message_queue::delivered_message_id.eq(Some(replacement_id)))
                .execute(&mut conn)?;
        }

        Ok(())
    }

    /// The long-running poller: ticks `process_due` on `poll_interval_seconds`
    /// until `shutdown` fires, then returns once the in-flight tick finishes
    /// (spec.md §5's cooperative-shutdown requirement).
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(self.config.poll_interval_seconds));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let orchestrator = self.clone();
                    let result = tokio::task::spawn_blocking(move || orchestrator.process_due()).await;
                    match result {
                        Ok(Ok(advanced)) if advanced > 0 => info!(advanced, "orchestrator poll tick processed due messages"),
                        Ok(Ok(_)) => {}
                        Ok(Err(err)) => error!(error = %err, "orchestrator poll tick failed"),
                        Err(join_err) => error!(error = %join_err, "orchestrator poll tick panicked"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        warn!("orchestrator poller shutting down");
                        break;
                    }
                }
            }
        }
    }
}
