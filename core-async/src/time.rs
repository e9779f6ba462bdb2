//! Time-related operations.

pub use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
pub use tokio::time::{
    interval, interval_at, sleep, sleep_until, timeout, Interval, MissedTickBehavior, Sleep,
    Timeout,
};

/// Error returned by [`timeout`] when the deadline elapses first.
pub use tokio::time::error::Elapsed;

/// Interval ticker whose first tick fires one `period` from now rather than
/// immediately, and which skips ticks it could not deliver on time.
pub fn delayed_interval(period: Duration) -> Interval {
    let start = tokio::time::Instant::now() + period;
    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Current Unix timestamp in milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
