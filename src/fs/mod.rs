/*!
 * Filesystem Facade
 *
 * `Fs` owns one request slot pool, the completion dispatcher and a handle
 * to the native backend. It is single-threaded: operations are issued and
 * continuations run on the thread that drives the loop (`poll`, `run` or
 * `block_on`). The native layer may complete work on any thread; results
 * come back over a channel and are dispatched here.
 *
 * Surfaces:
 * - callback primitives (`open`, `read`, `stat`, ...) in `ops`
 * - blocking variants (`open_sync`, ...) in `sync`
 * - directory iteration in `dir`
 * - whole-file helpers in `file`, tree helpers in `tree`
 * - future-returning versions of everything in `promises`
 */

mod dir;
mod file;
mod flags;
mod ops;
mod promises;
mod sync;
mod tree;

pub use dir::Dir;
pub use flags::{parse_mode, OpenFlags, F_OK, R_OK, W_OK, X_OK};
pub use promises::{Pending, Promises};
pub use tree::{CpOptions, MkdirOptions, RmOptions};

pub(crate) use ops::Callback;
pub(crate) use promises::promise;

use crate::core::{ErrnoTable, FsConfig, FsError, FsResult};
use crate::native::{NativeBackend, NativeOp, ThreadPoolBackend};
use crate::requests::{
    Completion, CompletionToken, Continuation, Dispatcher, Outputs, PoolStats, SlotPool,
};
use futures::executor::{LocalPool, LocalSpawner};
use futures::task::LocalSpawnExt;
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{debug, info, trace};

/// Handle to a filesystem event loop
///
/// Cheap to clone; all clones share the same pool and loop. Not `Send`.
#[derive(Clone)]
pub struct Fs {
    inner: Rc<FsInner>,
}

struct FsInner {
    pool: RefCell<SlotPool>,
    dispatcher: Dispatcher,
    backend: Arc<dyn NativeBackend>,
    sender: flume::Sender<Completion>,
    completions: flume::Receiver<Completion>,
    tasks: RefCell<LocalPool>,
    spawner: LocalSpawner,
    config: FsConfig,
}

/// Builder for `Fs`
#[derive(Default)]
pub struct FsBuilder {
    config: Option<FsConfig>,
    backend: Option<Arc<dyn NativeBackend>>,
    errnos: Option<ErrnoTable>,
}

impl FsBuilder {
    pub fn with_config(mut self, config: FsConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a custom native backend instead of the thread pool
    pub fn with_backend(mut self, backend: Arc<dyn NativeBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_errno_table(mut self, errnos: ErrnoTable) -> Self {
        self.errnos = Some(errnos);
        self
    }

    pub fn build(self) -> FsResult<Fs> {
        let config = self.config.unwrap_or_default().sanitized();
        let backend = match self.backend {
            Some(backend) => backend,
            None => Arc::new(ThreadPoolBackend::new(config.worker_threads)?),
        };
        let errnos = Arc::new(self.errnos.unwrap_or_else(ErrnoTable::system));
        let (sender, completions) = flume::unbounded();
        let tasks = LocalPool::new();
        let spawner = tasks.spawner();

        info!(
            initial_slots = config.initial_slots,
            readdir_batch = config.readdir_batch,
            stream_chunk_size = config.stream_chunk_size,
            "Filesystem loop created"
        );

        Ok(Fs {
            inner: Rc::new(FsInner {
                pool: RefCell::new(SlotPool::with_capacity(config.initial_slots)),
                dispatcher: Dispatcher::new(errnos, config.slow_op_threshold),
                backend,
                sender,
                completions,
                tasks: RefCell::new(tasks),
                spawner,
                config,
            }),
        })
    }
}

impl Fs {
    /// Loop with the default configuration and thread-pool backend
    pub fn new() -> FsResult<Self> {
        Self::builder().build()
    }

    /// Loop configured from `SLOTFS_*` environment variables
    pub fn from_env() -> FsResult<Self> {
        Self::builder().with_config(FsConfig::from_env()).build()
    }

    pub fn builder() -> FsBuilder {
        FsBuilder::default()
    }

    pub fn config(&self) -> &FsConfig {
        &self.inner.config
    }

    pub fn errnos(&self) -> &ErrnoTable {
        self.inner.dispatcher.errnos()
    }

    /// Pool statistics snapshot
    pub fn stats(&self) -> PoolStats {
        self.inner.pool.borrow().stats()
    }

    /// Operations currently in flight
    pub fn in_flight(&self) -> usize {
        self.inner.pool.borrow().active()
    }

    /// Dispatch every completion that is already available, then run ready
    /// local tasks. Never blocks. Returns the number of completions dispatched.
    pub fn poll(&self) -> FsResult<usize> {
        let mut dispatched = 0;
        while let Ok(completion) = self.inner.completions.try_recv() {
            self.dispatch(completion)?;
            dispatched += 1;
        }
        self.run_tasks();
        Ok(dispatched)
    }

    /// Drive the loop until nothing is in flight
    ///
    /// Blocks while operations are outstanding, so with a backend that
    /// parks submissions this only returns once they are completed.
    pub fn run(&self) -> FsResult<()> {
        loop {
            self.poll()?;
            if self.in_flight() == 0 {
                return Ok(());
            }
            self.wait()?;
        }
    }

    /// Drive the loop until `future` resolves
    ///
    /// Fails with `FsError::Stalled` if the future is still pending while
    /// no operation is in flight and no local task can make progress.
    /// Must not be called from inside a continuation or a spawned task.
    pub fn block_on<F: Future>(&self, future: F) -> FsResult<F::Output> {
        let mut future = std::pin::pin!(future);
        let waker = futures::task::noop_waker();
        let mut cx = Context::from_waker(&waker);

        loop {
            if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
                return Ok(output);
            }
            if self.poll()? > 0 {
                continue;
            }
            if self.in_flight() == 0 {
                return match future.as_mut().poll(&mut cx) {
                    Poll::Ready(output) => Ok(output),
                    Poll::Pending => Err(FsError::Stalled),
                };
            }
            self.wait()?;
        }
    }

    /// Run `future` as a local task driven by this loop
    pub fn spawn<F>(&self, future: F) -> FsResult<()>
    where
        F: Future<Output = ()> + 'static,
    {
        self.inner
            .spawner
            .spawn_local(future)
            .map_err(|e| FsError::Backend(format!("failed to spawn task: {}", e)))
    }

    /// Issue `op`; `continuation` runs once when the native layer reports back
    pub(crate) fn submit(&self, op: NativeOp, outputs: Option<Outputs>, continuation: Continuation) {
        let kind = op.kind();
        let control = {
            let mut pool = self.inner.pool.borrow_mut();
            let slot = pool.acquire();
            slot.arm(kind, outputs, continuation);
            debug!(id = slot.identity(), op = kind.name(), "Slot acquired");
            slot.control().clone()
        };
        let token = CompletionToken::new(control, self.inner.sender.clone());
        self.inner.backend.submit(op, token);
    }

    /// Perform `op` on this thread, mapping a negative result to an error
    pub(crate) fn execute_sync(&self, op: &NativeOp, outputs: &mut Option<Outputs>) -> FsResult<i64> {
        let result = self.inner.backend.execute_sync(op, outputs);
        trace!(op = op.kind().name(), result = result, "Synchronous operation");
        if result < 0 {
            return Err(self.errnos().result_error(result));
        }
        Ok(result)
    }

    fn dispatch(&self, completion: Completion) -> FsResult<()> {
        // Identity is read now: swaps may have moved the slot since issue
        let id = completion.control.id();
        self.inner
            .dispatcher
            .on_completion(&self.inner.pool, id, completion.result)?;
        Ok(())
    }

    fn wait(&self) -> FsResult<()> {
        let completion = self
            .inner
            .completions
            .recv()
            .map_err(|_| FsError::Backend("completion channel closed".into()))?;
        self.dispatch(completion)
    }

    fn run_tasks(&self) {
        // Re-entrant calls from inside a task leave the outer run in charge
        if let Ok(mut tasks) = self.inner.tasks.try_borrow_mut() {
            tasks.run_until_stalled();
        }
    }
}

impl std::fmt::Debug for Fs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fs")
            .field("config", &self.inner.config)
            .field("pool", &self.stats())
            .finish()
    }
}

/// The native layer succeeded but did not hand back the block it filled
fn missing_output(op: &str) -> FsError {
    FsError::Backend(format!("{} completed without its output block", op))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::ManualBackend;
    use nix::errno::Errno;
    use std::cell::Cell;
    use tempfile::TempDir;

    fn manual() -> (Fs, Arc<ManualBackend>) {
        let backend = Arc::new(ManualBackend::new());
        let fs = Fs::builder()
            .with_config(FsConfig::minimal())
            .with_backend(backend.clone())
            .build()
            .unwrap();
        (fs, backend)
    }

    #[test]
    fn test_poll_dispatches_manual_completions() {
        let (fs, backend) = manual();
        let dir = TempDir::new().unwrap();
        let done = Rc::new(Cell::new(false));

        let flag = done.clone();
        fs.mkdir(dir.path().join("x"), MkdirOptions::default(), move |r| {
            r.unwrap();
            flag.set(true);
        });
        assert_eq!(fs.in_flight(), 1);
        assert_eq!(fs.poll().unwrap(), 0);
        assert!(!done.get());

        backend.perform(0);
        assert_eq!(fs.poll().unwrap(), 1);
        assert!(done.get());
        assert_eq!(fs.in_flight(), 0);
    }

    #[test]
    fn test_block_on_reports_stall() {
        let (fs, _backend) = manual();
        let err = fs.block_on(futures::future::pending::<()>()).unwrap_err();
        assert_eq!(err, FsError::Stalled);
    }

    #[test]
    fn test_spawned_task_runs_on_poll() {
        let (fs, backend) = manual();
        let dir = TempDir::new().unwrap();
        let result = Rc::new(RefCell::new(None));

        let out = result.clone();
        let path = dir.path().join("missing");
        let promises = fs.promises();
        fs.spawn(async move {
            *out.borrow_mut() = Some(promises.stat(path).await.map(|_| ()));
        })
        .unwrap();

        fs.poll().unwrap();
        assert_eq!(backend.pending(), vec![0]);
        backend.fail(0, Errno::ENOENT);
        fs.poll().unwrap();

        let result = result.borrow_mut().take().unwrap();
        assert!(result.unwrap_err().is_not_found());
    }

    #[test]
    fn test_run_with_thread_pool() {
        let fs = Fs::builder().with_config(FsConfig::minimal()).build().unwrap();
        let dir = TempDir::new().unwrap();
        let done = Rc::new(Cell::new(0));

        for name in ["a", "b", "c"] {
            let done = done.clone();
            fs.mkdir(dir.path().join(name), MkdirOptions::default(), move |r| {
                r.unwrap();
                done.set(done.get() + 1);
            });
        }
        fs.run().unwrap();
        assert_eq!(done.get(), 3);
        assert!(fs.stats().capacity <= 3);
    }
}
