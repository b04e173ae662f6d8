use chrono::{DateTime, Utc};

/// Wall-clock capability. Injected everywhere time is read so scheduling
/// logic can be driven by a fake clock in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
