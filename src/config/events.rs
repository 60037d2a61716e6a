use anyhow::Result;
use std::env;

/// Tuning for the Event Processor's poll loop (spec.md §3, §4.2).
#[derive(Debug, Clone)]
pub struct EventsConfig {
    pub poll_interval_seconds: u64,
    pub batch_size: i64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub dead_letter_retention_days: i64,
}

impl EventsConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            poll_interval_seconds: env::var("EVENTS_POLL_INTERVAL_SECONDS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            batch_size: env::var("EVENTS_BATCH_SIZE")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .unwrap_or(20),
            max_retries: env::var("EVENTS_MAX_RETRIES")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            retry_delay_seconds: env::var("EVENTS_RETRY_DELAY_SECONDS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            dead_letter_retention_days: env::var("EVENTS_DEAD_LETTER_RETENTION_DAYS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
        })
    }
}

/// Tuning for the Task Processor's poll loop (spec.md §4.3).
#[derive(Debug, Clone)]
pub struct TasksConfig {
    pub poll_interval_seconds: u64,
    pub batch_size: i64,
    pub default_max_retries: i32,
}

impl TasksConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            poll_interval_seconds: env::var("TASKS_POLL_INTERVAL_SECONDS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            batch_size: env::var("TASKS_BATCH_SIZE")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            default_max_retries: env::var("TASKS_DEFAULT_MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
        })
    }
}

/// Tuning for the SMS Dispatcher boundary's claim loop (spec.md §5).
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub poll_interval_seconds: u64,
    pub batch_size: i64,
    pub max_send_attempts: i32,
    pub stale_reservation_minutes: i64,
}

impl DispatcherConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            poll_interval_seconds: env::var("DISPATCHER_POLL_INTERVAL_SECONDS")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .unwrap_or(2),
            batch_size: env::var("DISPATCHER_BATCH_SIZE")
                .unwrap_or_else(|_| "25".to_string())
                .parse()
                .unwrap_or(25),
            max_send_attempts: env::var("DISPATCHER_MAX_SEND_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
            stale_reservation_minutes: env::var("DISPATCHER_STALE_RESERVATION_MINUTES")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
        })
    }
}

/// Tuning for the Message Orchestrator's Send Pipeline (spec.md §4.1).
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub poll_interval_seconds: u64,
    pub batch_size: i64,
    pub default_daily_limit: i32,
    pub default_hourly_limit: i32,
    pub hourly_window_minutes: i64,
    pub default_quiet_hours_start_minute: i32,
    pub default_quiet_hours_end_minute: i32,
}

impl OrchestratorConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            poll_interval_seconds: env::var("ORCHESTRATOR_POLL_INTERVAL_SECONDS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
            batch_size: env::var("ORCHESTRATOR_BATCH_SIZE")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .unwrap_or(50),
            default_daily_limit: env::var("ORCHESTRATOR_DEFAULT_DAILY_LIMIT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            default_hourly_limit: env::var("ORCHESTRATOR_DEFAULT_HOURLY_LIMIT")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .unwrap_or(2),
            hourly_window_minutes: env::var("ORCHESTRATOR_HOURLY_WINDOW_MINUTES")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
            default_quiet_hours_start_minute: env::var("ORCHESTRATOR_QUIET_HOURS_START_MINUTE")
                .unwrap_or_else(|_| "1320".to_string())
                .parse()
                .unwrap_or(1320),
            default_quiet_hours_end_minute: env::var("ORCHESTRATOR_QUIET_HOURS_END_MINUTE")
                .unwrap_or_else(|_| "480".to_string())
                .parse()
                .unwrap_or(480),
        })
    }
}
