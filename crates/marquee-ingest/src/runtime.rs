//! Runtime ownership for the binary
//!
//! The runtime is built once and consumed by [`run_to_completion`], so it is
//! shut down exactly once whether the import succeeds or fails.

use std::future::Future;
use std::time::Duration;

use marquee_common::{IngestError, Result};
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

/// Default time allowed for blocking readers to wind down at shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Build a multi-threaded runtime, optionally with a fixed worker count
pub fn build_runtime(worker_threads: Option<usize>) -> Result<Runtime> {
    let mut builder = Builder::new_multi_thread();
    builder.enable_all().thread_name("marquee-worker");
    if let Some(threads) = worker_threads {
        builder.worker_threads(threads.max(1));
    }
    builder
        .build()
        .map_err(|e| IngestError::task(format!("failed to build runtime: {}", e)))
}

/// Drive `future` to completion, then shut the runtime down
pub fn run_to_completion<F: Future>(runtime: Runtime, future: F) -> F::Output {
    let output = runtime.block_on(future);
    debug!("Shutting down runtime");
    runtime.shutdown_timeout(Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS));
    output
}
