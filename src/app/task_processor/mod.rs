pub mod builtin;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::Text;
use serde_json::json;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::config::TasksConfig;
use crate::database::DbPool;
use crate::models::{DieselUlid, Task, TaskStatus};
use crate::schema::agent_tasks;

pub use error::TaskProcessorError;
pub use handlers::{HandlerError, TaskHandler, TaskHandlerRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteOutcome {
    Completed,
    Retrying,
    Failed,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TaskProcessorStats {
    pub completed: u64,
    pub retried: u64,
    pub failed: u64,
}

pub struct TaskProcessor {
    pool: DbPool,
    config: TasksConfig,
    registry: Arc<TaskHandlerRegistry>,
    clock: Arc<dyn Clock>,
    stats: std::sync::Mutex<TaskProcessorStats>,
    last_poll_error: std::sync::Mutex<Option<String>>,
}

impl TaskProcessor {
    pub fn new(pool: DbPool, config: TasksConfig, registry: Arc<TaskHandlerRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            config,
            registry,
            clock,
            stats: std::sync::Mutex::new(TaskProcessorStats::default()),
            last_poll_error: std::sync::Mutex::new(None),
        }
    }

    pub fn stats(&self) -> TaskProcessorStats {
        *self.stats.lock().expect("task processor stats lock poisoned")
    }

    /// Backs `/health` (spec.md §6/§7): mirrors `EventProcessor::last_poll_error`.
    pub fn last_poll_error(&self) -> Option<String> {
        self.last_poll_error.lock().expect("task processor poll-error lock poisoned").clone()
    }

    /// spec.md §4.3 `poll()`: read-only view of due, pending tasks, ordered
    /// priority-first and then FIFO, same shape as the Orchestrator's
    /// `process_due` ordering.
    pub fn poll(&self) -> Result<Vec<Task>, TaskProcessorError> {
        let mut conn = self.pool.get().map_err(crate::error::StoreError::from)?;
        let now = self.clock.now();
        let mut due: Vec<Task> = agent_tasks::table
            .filter(agent_tasks::status.eq(TaskStatus::Pending.as_str()))
            .filter(agent_tasks::scheduled_for.le(now))
            .order((agent_tasks::scheduled_for.asc(), agent_tasks::created_at.asc()))
            .load(&mut conn)?;
        due.sort_by_key(|task| task.priority());
        due.truncate(self.config.batch_size as usize);
        Ok(due)
    }

    /// spec.md §4.3 `execute(task_id)`: claims the row with
    /// `FOR UPDATE SKIP LOCKED`, runs the handler registered for
    /// `task.task_type`, and applies `60 * 2^retry_count` backoff on
    /// failure (`Task::next_retry_delay_seconds`).
    pub fn execute(&self, task_id: DieselUlid) -> Result<ExecuteOutcome, TaskProcessorError> {
        let mut conn = self.pool.get().map_err(crate::error::StoreError::from)?;
        let now = self.clock.now();
        conn.transaction(|conn| self.execute_claimed(conn, task_id, now))
    }

    fn execute_claimed(&self, conn: &mut PgConnection, task_id: DieselUlid, now: DateTime<Utc>) -> Result<ExecuteOutcome, TaskProcessorError> {
        let claimed: Option<Task> = sql_query("SELECT * FROM agent_tasks WHERE id = $1 FOR UPDATE SKIP LOCKED")
            .bind::<Text, _>(task_id.to_string())
            .get_result(conn)
            .optional()?;

        let Some(task) = claimed else {
            return Err(TaskProcessorError::NotFound(task_id));
        };
        if task.status().is_terminal() {
            return Ok(match task.status() {
                TaskStatus::Completed => ExecuteOutcome::Completed,
                _ => ExecuteOutcome::Failed,
            });
        }

        diesel::update(agent_tasks::table.find(task.id))
            .set((agent_tasks::status.eq(TaskStatus::Processing.as_str()), agent_tasks::last_attempted_at.eq(now)))
            .execute(conn)?;

        let handler = self.registry.handler_for(&task.task_type);

        // spec.md §4.3: unknown task types log and mark the task failed
        // permanently — they never enter the retry loop, since no handler
        // will ever materialize for them on a later attempt.
        let Some(handler) = handler else {
            warn!(task_id = %task.id, task_type = %task.task_type, "no handler registered for task type, marking failed");
            let error_log = json!({ "error": format!("no handler registered for task type '{}'", task.task_type) });
            diesel::update(agent_tasks::table.find(task.id))
                .set((
                    agent_tasks::status.eq(TaskStatus::Failed.as_str()),
                    agent_tasks::error_log.eq(Some(error_log)),
                    agent_tasks::completed_at.eq(now),
                ))
                .execute(conn)?;
            self.stats.lock().expect("task processor stats lock poisoned").failed += 1;
            return Ok(ExecuteOutcome::Failed);
        };

        let outcome = futures::executor::block_on(handler.execute(task.user_id, &task.context));

        match outcome {
            Ok(result) => {
                diesel::update(agent_tasks::table.find(task.id))
                    .set((
                        agent_tasks::status.eq(TaskStatus::Completed.as_str()),
                        agent_tasks::result.eq(Some(result)),
                        agent_tasks::completed_at.eq(now),
                    ))
                    .execute(conn)?;
                self.stats.lock().expect("task processor stats lock poisoned").completed += 1;
                Ok(ExecuteOutcome::Completed)
            }
            Err(err) => {
                let retry_count = task.retry_count + 1;
                let error_log = json!({ "error": err.message, "retry_count": retry_count });
                if !err.retryable || retry_count >= task.max_retries {
                    diesel::update(agent_tasks::table.find(task.id))
                        .set((
                            agent_tasks::status.eq(TaskStatus::Failed.as_str()),
                            agent_tasks::retry_count.eq(retry_count),
                            agent_tasks::error_log.eq(Some(error_log)),
                            agent_tasks::completed_at.eq(now),
                        ))
                        .execute(conn)?;
                    self.stats.lock().expect("task processor stats lock poisoned").failed += 1;
                    warn!(task_id = %task.id, task_type = %task.task_type, "task exhausted retries");
                    Ok(ExecuteOutcome::Failed)
                } else {
                    // spec.md §4.3/§8 scenario 5: first retry at T+60s, then
                    // T+120s, T+240s — i.e. 60·2^(pre-increment retry_count).
                    let delay_seconds = task.next_retry_delay_seconds();
                    diesel::update(agent_tasks::table.find(task.id))
                        .set((
                            agent_tasks::status.eq(TaskStatus::Pending.as_str()),
                            agent_tasks::retry_count.eq(retry_count),
                            agent_tasks::error_log.eq(Some(error_log)),
                            agent_tasks::scheduled_for.eq(now + Duration::seconds(delay_seconds)),
                        ))
                        .execute(conn)?;
                    self.stats.lock().expect("task processor stats lock poisoned").retried += 1;
                    Ok(ExecuteOutcome::Retrying)
                }
            }
        }
    }

    pub fn run_once(&self) -> Result<usize, TaskProcessorError> {
        let due = self.poll()?;
        let mut advanced = 0;
        for task in due {
            match self.execute(task.id) {
                Ok(_) => advanced += 1,
                Err(err) => error!(task_id = %task.id, error = %err, "task execution failed"),
            }
        }
        Ok(advanced)
    }

    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(self.config.poll_interval_seconds));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let processor = self.clone();
                    let result = tokio::task::spawn_blocking(move || processor.run_once()).await;
                    let mut last_poll_error = self.last_poll_error.lock().expect("task processor poll-error lock poisoned");
                    match result {
                        Ok(Ok(advanced)) => {
                            *last_poll_error = None;
                            if advanced > 0 {
                                info!(advanced, "task processor poll tick advanced tasks");
                            }
                        }
                        Ok(Err(err)) => {
                            *last_poll_error = Some(err.to_string());
                            error!(error = %err, "task processor poll tick failed");
                        }
                        Err(join_err) => {
                            *last_poll_error = Some(join_err.to_string());
                            error!(error = %join_err, "task processor poll tick panicked");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        warn!("task processor poller shutting down");
                        break;
                    }
                }
            }
        }
    }
}
