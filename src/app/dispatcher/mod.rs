use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::Text;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::config::DispatcherConfig;
use crate::database::DbPool;
use crate::error::StoreError;
use crate::models::{DieselUlid, Message, MessageStatus};
use crate::schema::messages;

const MAX_SEND_RETRIES_DEFAULT: i32 = 3;

#[derive(Debug, Error)]
pub enum SmsProviderError {
    #[error("sms provider request failed: {0}")]
    Request(String),
}

/// The external SMS provider boundary (spec.md §6). Everything on the
/// Orchestrator's side of this trait is this crate's concern; everything
/// past `send` belongs to the provider and is explicitly out of scope for
/// retry/backoff semantics beyond what's implemented here.
#[async_trait]
pub trait SmsProvider: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> Result<String, SmsProviderError>;
}

#[derive(Debug, Error)]
pub enum DispatcherError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("database error: {0}")]
    Diesel(#[from] diesel::result::Error),
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DispatcherStats {
    pub sent: u64,
    pub failed: u64,
}

/// The SMS Dispatcher boundary: a separate logical process (spec.md §5)
/// from the Message Orchestrator that only sees `pending` Messages, claims
/// them into `queued_for_send`, calls the provider, and settles them into
/// `sent`/`failed`. It never looks at `message_queue`, budgets, or quiet
/// hours — those gates already ran before a Message reached `pending`.
pub struct Dispatcher {
    pool: DbPool,
    config: DispatcherConfig,
    provider: Arc<dyn SmsProvider>,
    clock: Arc<dyn Clock>,
    stats: std::sync::Mutex<DispatcherStats>,
}

impl Dispatcher {
    pub fn new(pool: DbPool, config: DispatcherConfig, provider: Arc<dyn SmsProvider>, clock: Arc<dyn Clock>) -> Self {
        Self { pool, config, provider, clock, stats: std::sync::Mutex::new(DispatcherStats::default()) }
    }

    pub fn stats(&self) -> DispatcherStats {
        *self.stats.lock().expect("dispatcher stats lock poisoned")
    }

    /// Claims up to `batch_size` `pending` Messages via the same
    /// `DatabaseQueueDriver::pop` claim-by-update pattern this crate uses
    /// everywhere else: one `UPDATE ... WHERE id = (SELECT ... FOR UPDATE
    /// SKIP LOCKED) RETURNING *` per row, so concurrent Dispatcher instances
    /// never double-send, and hands each to the provider, retrying transient
    /// failures up to three times with `1s, 2s, 4s` backoff before marking
    /// it `failed`.
    pub fn run_once(&self) -> Result<usize, DispatcherError> {
        let mut conn = self.pool.get().map_err(StoreError::from)?;
        let mut dispatched = 0;
        for _ in 0..self.config.batch_size {
            let claimed = claim_next_pending(&mut conn, self.clock.now())?;
            let Some(message) = claimed else { break };
            self.dispatch_one(&mut conn, message);
            dispatched += 1;
        }
        Ok(dispatched)
    }

    fn dispatch_one(&self, conn: &mut PgConnection, message: Message) {
        let to = match user_phone_number(conn, message.user_id) {
            Ok(phone) => phone,
            Err(err) => {
                error!(message_id = %message.id, error = %err, "could not resolve recipient phone number");
                let _ = mark_failed(conn, message.id, self.clock.now());
                self.stats.lock().expect("dispatcher stats lock poisoned").failed += 1;
                return;
            }
        };

        let max_attempts = if self.config.max_send_attempts > 0 { self.config.max_send_attempts } else { MAX_SEND_RETRIES_DEFAULT };
        let mut last_error = String::new();
        for attempt in 0..max_attempts {
            match futures::executor::block_on(self.provider.send(&to, &message.content)) {
                Ok(provider_message_id) => {
                    let now = self.clock.now();
                    if let Err(err) = mark_sent(conn, message.id, &provider_message_id, now) {
                        error!(message_id = %message.id, error = %err, "failed to persist sent status");
                    }
                    self.stats.lock().expect("dispatcher stats lock poisoned").sent += 1;
                    return;
                }
                Err(err) => {
                    last_error = err.to_string();
                    if attempt + 1 < max_attempts {
                        std::thread::sleep(std::time::Duration::from_secs(1u64 << attempt as u32));
                    }
                }
            }
        }

        warn!(message_id = %message.id, error = %last_error, "sms provider send failed after retries, marking message failed");
        let _ = mark_failed(conn, message.id, self.clock.now());
        self.stats.lock().expect("dispatcher stats lock poisoned").failed += 1;
    }

    /// Resets Messages stuck in `queued_for_send` past
    /// `stale_reservation_minutes` (a Dispatcher process that died mid-send)
    /// back to `pending` so another instance can retry them. Same
    /// `DatabaseQueueDriver::cleanup_completed_jobs`-style maintenance sweep
    /// as the Event Processor's dead-letter pruning; supplemented beyond
    /// spec.md (see SPEC_FULL.md).
    pub fn cleanup_stale_reservations(&self) -> Result<u64, DispatcherError> {
        let mut conn = self.pool.get().map_err(StoreError::from)?;
        let cutoff = self.clock.now() - Duration::minutes(self.config.stale_reservation_minutes);
        let reset = diesel::update(
            messages::table
                .filter(messages::status.eq(MessageStatus::QueuedForSend.as_str()))
                .filter(messages::updated_at.lt(cutoff)),
        )
        .set((messages::status.eq(MessageStatus::Pending.as_str()), messages::updated_at.eq(self.clock.now())))
        .execute(&mut conn)?;
        Ok(reset as u64)
    }

    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(self.config.poll_interval_seconds));
        // Sweeps stranded `queued_for_send` reservations far less often than
        // the claim loop ticks; there's no urgency to it, just eventual cleanup.
        let mut maintenance = tokio::time::interval(std::time::Duration::from_secs(60));
        maintenance.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let dispatcher = self.clone();
                    let result = tokio::task::spawn_blocking(move || dispatcher.run_once()).await;
                    match result {
                        Ok(Ok(dispatched)) if dispatched > 0 => info!(dispatched, "dispatcher poll tick sent messages"),
                        Ok(Ok(_)) => {}
                        Ok(Err(err)) => error!(error = %err, "dispatcher poll tick failed"),
                        Err(join_err) => error!(error = %join_err, "dispatcher poll tick panicked"),
                    }
                }
                _ = maintenance.tick() => {
                    let dispatcher = self.clone();
                    let result = tokio::task::spawn_blocking(move || dispatcher.cleanup_stale_reservations()).await;
                    match result {
                        Ok(Ok(reset)) if reset > 0 => info!(reset, "dispatcher reclaimed stale reservations"),
                        Ok(Ok(_)) => {}
                        Ok(Err(err)) => error!(error = %err, "dispatcher maintenance sweep failed"),
                        Err(join_err) => error!(error = %join_err, "dispatcher maintenance sweep panicked"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        warn!("dispatcher poller shutting down");
                        break;
                    }
                }
            }
        }
    }
}

fn claim_next_pending(conn: &mut PgConnection, now: DateTime<Utc>) -> Result<Option<Message>, diesel::result::Error> {
    sql_query(
        r#"UPDATE messages SET status = 'queued_for_send', updated_at = $1
           WHERE id = (
               SELECT id FROM messages
               WHERE status = 'pending'
               ORDER BY created_at ASC
               FOR UPDATE SKIP LOCKED
               LIMIT 1
           )
           RETURNING *"#,
    )
    .bind::<diesel::sql_types::Timestamptz, _>(now)
    .get_result(conn)
    .optional()
}

fn user_phone_number(conn: &mut PgConnection, user_id: DieselUlid) -> Result<String, diesel::result::Error> {
    use crate::schema::users;
    users::table.find(user_id).select(users::phone_number).first(conn)
}

fn mark_sent(conn: &mut PgConnection, message_id: DieselUlid, provider_message_id: &str, now: DateTime<Utc>) -> Result<(), diesel::result::Error> {
    diesel::update(messages::table.find(message_id))
        .set((
            messages::status.eq(MessageStatus::Sent.as_str()),
            messages::provider_message_id.eq(Some(provider_message_id.to_string())),
            messages::sent_at.eq(Some(now)),
            messages::updated_at.eq(now),
        ))
        .execute(conn)?;
    Ok(())
}

fn mark_failed(conn: &mut PgConnection, message_id: DieselUlid, now: DateTime<Utc>) -> Result<(), diesel::result::Error> {
    diesel::update(messages::table.find(message_id))
        .set((messages::status.eq(MessageStatus::Failed.as_str()), messages::updated_at.eq(now)))
        .execute(conn)?;
    Ok(())
}

/// The only concrete `SmsProvider`: a thin `reqwest` wrapper over a
/// Twilio-shaped "send message" HTTP endpoint.
pub struct HttpSmsProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    from_number: String,
}

impl HttpSmsProvider {
    pub fn new(config: &crate::config::ProviderConfig) -> Self {
        let client = reqwest::Client::builder().timeout(config.request_timeout()).build().expect("reqwest client config is static");
        Self { client, base_url: config.sms_base_url.clone(), api_key: config.sms_api_key.clone(), from_number: config.sms_from_number.clone() }
    }
}

#[derive(serde::Deserialize)]
struct SendMessageResponse {
    sid: String,
}

#[async_trait]
impl SmsProvider for HttpSmsProvider {
    async fn send(&self, to: &str, body: &str) -> Result<String, SmsProviderError> {
        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "from": self.from_number, "to": to, "body": body }))
            .send()
            .await
            .map_err(|err| SmsProviderError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(SmsProviderError::Request(format!("sms provider returned {}", response.status())));
        }

        let parsed: SendMessageResponse = response.json().await.map_err(|err| SmsProviderError::Request(err.to_string()))?;
        Ok(parsed.sid)
    }
}
