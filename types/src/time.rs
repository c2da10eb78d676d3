//! Unix time helpers and the clock seam.
//!
//! Times are Unix epoch seconds (UTC) stored as `i64` so that the `-1`
//! "not in a block yet" sentinel fits alongside real values.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current system time in Unix seconds. Returns 0 if the clock is before the epoch.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Source of "now" for mempool times, block times and wallet activity stamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        unix_now()
    }
}
