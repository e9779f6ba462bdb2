//! Synchronization primitives.
//!
//! Async-aware locks and channels from `tokio::sync`, plus the
//! [`CancellationToken`] used to tear down background work in one call.

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, RwLock, RwLockReadGuard,
    RwLockWriteGuard, Semaphore,
};

pub use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFuture};
