//! Nullable clock: deterministic time for testing.

use std::sync::atomic::{AtomicI64, Ordering};
use txflow_types::Clock;

/// A deterministic clock for testing.
///
/// Time only advances when you tell it to.
pub struct NullClock {
    current: AtomicI64,
}

impl NullClock {
    pub fn new(initial_secs: i64) -> Self {
        Self {
            current: AtomicI64::new(initial_secs),
        }
    }

    /// Advance time by a number of seconds.
    pub fn advance(&self, secs: i64) {
        self.current.fetch_add(secs, Ordering::SeqCst);
    }

    /// Set the time to a specific value.
    pub fn set(&self, secs: i64) {
        self.current.store(secs, Ordering::SeqCst);
    }
}

impl Clock for NullClock {
    fn now(&self) -> i64 {
        self.current.load(Ordering::SeqCst)
    }
}
