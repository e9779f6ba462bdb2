//! Runtime utilities for synchronous callers.

pub use tokio::runtime::{Builder, Handle, Runtime};

/// Runs the provided future to completion on a throwaway current-thread runtime.
///
/// Fails only if the runtime cannot be built (no I/O driver available).
pub fn block_on<F>(future: F) -> std::io::Result<F::Output>
where
    F: std::future::Future,
{
    let runtime = Builder::new_current_thread().enable_all().build()?;
    Ok(runtime.block_on(future))
}
