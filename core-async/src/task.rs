//! Task spawning.
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//!
//! async fn example() {
//!     let guard = task::TaskGuard::spawn(async {
//!         // runs until the guard is dropped
//!     });
//!     drop(guard);
//! }
//! ```

pub use tokio::task::{spawn_blocking, yield_now, AbortHandle, JoinError, JoinHandle};

/// Spawns a new asynchronous task on the current Tokio runtime.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}

/// Owns a background task and aborts it when dropped.
///
/// Used for helper tasks (event pumps, pollers) whose lifetime must not
/// exceed the value that started them.
#[derive(Debug)]
pub struct TaskGuard {
    abort: AbortHandle,
}

impl TaskGuard {
    /// Spawn `future` and tie it to the returned guard.
    pub fn spawn<F>(future: F) -> Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = spawn(future);
        Self {
            abort: handle.abort_handle(),
        }
    }

    /// Whether the guarded task has already completed.
    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.abort.abort();
    }
}

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, JoinError>;
