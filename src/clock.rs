//! Wall-clock source for correlation timestamps.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug, Default)]
pub struct MockClock {
    offset: AtomicI64,
}

impl MockClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            offset: AtomicI64::new(start_millis),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset
            .fetch_add(by.as_millis() as i64, Ordering::Release);
    }

    pub fn set(&self, millis: i64) {
        self.offset.store(millis, Ordering::Release);
    }
}

impl Clock for MockClock {
    fn now_millis(&self) -> i64 {
        self.offset.load(Ordering::Acquire)
    }
}
