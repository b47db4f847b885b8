/*!
 * Thread-Pool Backend
 *
 * Runs blocking syscalls on the blocking pool of a small tokio runtime
 * and reports completions back over the loop's channel.
 */

use super::exec::Executor;
use super::op::NativeOp;
use super::NativeBackend;
use crate::core::{FsError, FsResult};
use crate::requests::{CompletionToken, Outputs};
use std::sync::Arc;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, info};

/// Default native backend
pub struct ThreadPoolBackend {
    handle: Handle,
    runtime: Option<Runtime>,
    executor: Arc<Executor>,
    workers: usize,
}

impl ThreadPoolBackend {
    /// Backend with at most `workers` syscalls in flight at once
    pub fn new(workers: usize) -> FsResult<Self> {
        let workers = workers.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(workers)
            .thread_name("slotfs-native")
            .build()
            .map_err(|e| FsError::Backend(format!("failed to start worker pool: {}", e)))?;

        info!(workers = workers, "Native thread pool started");

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
            executor: Arc::new(Executor::new()),
            workers,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl NativeBackend for ThreadPoolBackend {
    fn submit(&self, op: NativeOp, token: CompletionToken) {
        let executor = self.executor.clone();
        self.handle.spawn_blocking(move || {
            let mut outputs = token.take_outputs();
            let result = executor.execute(&op, &mut outputs);
            token.restore_outputs(outputs);
            token.complete(result);
        });
    }

    fn execute_sync(&self, op: &NativeOp, outputs: &mut Option<Outputs>) -> i64 {
        self.executor.execute(op, outputs)
    }
}

impl Drop for ThreadPoolBackend {
    fn drop(&mut self) {
        // Never block here: the owner may itself be running inside a runtime
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
            debug!("Native thread pool shut down");
        }
    }
}

impl std::fmt::Debug for ThreadPoolBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPoolBackend")
            .field("workers", &self.workers)
            .field("open_dirs", &self.executor.open_dirs())
            .finish()
    }
}
