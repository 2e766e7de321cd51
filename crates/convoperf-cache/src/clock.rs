//! A small clock abstraction so eviction-order and TTL tests can control
//! time deterministically instead of racing real wall-clock sleeps.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

/// Milliseconds since an arbitrary, monotonic epoch. Only relative
/// differences are meaningful.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Production clock: monotonic, backed by `std::time::Instant`.
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        self.start.elapsed().as_millis() as i64
    }
}

/// Test clock: an explicit counter advanced by the test, used to pin down
/// the exact millisecond boundaries the eviction-score and TTL invariants
/// (spec §8, properties 2 and 3) require.
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(start_millis),
        }
    }

    pub fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_millis: i64) {
        self.millis.fetch_add(delta_millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}
