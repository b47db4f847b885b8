/*!
 * Native Layer
 *
 * The capability contract the filesystem is built on: fire-and-forget
 * submission that reports back through a completion token, plus a
 * blocking variant for synchronous entry points. Both use the same sign
 * convention (negative errno on failure).
 */

mod exec;
mod manual;
mod op;
mod threadpool;

pub use exec::Executor;
pub use manual::ManualBackend;
pub use op::{NativeOp, OpKind};
pub use threadpool::ThreadPoolBackend;

use crate::requests::{CompletionToken, Outputs};

/// Native I/O backend
///
/// Implementations may complete submissions on any thread and in any
/// order. Each token must be completed exactly once; a dropped token
/// reports `ECANCELED`.
pub trait NativeBackend: Send + Sync {
    /// Issue `op`; the result arrives later through `token`
    fn submit(&self, op: NativeOp, token: CompletionToken);

    /// Perform `op` on the calling thread and return its signed result
    fn execute_sync(&self, op: &NativeOp, outputs: &mut Option<Outputs>) -> i64;
}
