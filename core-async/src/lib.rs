//! Tokio facade shared by the playback crates.
//!
//! Engine, session and guard code spawn, sleep and select through these
//! modules only, so the executor is named in exactly one Cargo.toml.
//!
//! - [`task`]: spawning, plus [`TaskGuard`](task::TaskGuard) for helper
//!   tasks that die with their owner
//! - [`time`]: timeouts and the delayed tickers used for position polling
//! - [`sync`]: channels, watch cells and cancellation tokens
//! - [`runtime`]: a blocking entry point for code with no runtime
//!
//! ```rust
//! use core_async::sync::CancellationToken;
//! use core_async::time::{delayed_interval, Duration};
//!
//! async fn poll_until_cancelled(cancel: CancellationToken) {
//!     let mut ticker = delayed_interval(Duration::from_millis(500));
//!     loop {
//!         core_async::select! {
//!             _ = cancel.cancelled() => break,
//!             _ = ticker.tick() => { /* sample position */ }
//!         }
//!     }
//! }
//! ```

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use tokio::select;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
