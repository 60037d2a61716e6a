use chrono::{DateTime, Utc};

/// Injected time source so the Send Pipeline's gates (daily/hourly budget,
/// quiet hours, active-user window) can be driven by a fixed instant in
/// tests instead of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
