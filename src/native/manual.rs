/*!
 * Manual Backend
 *
 * Parks every submission until the embedder decides how and when it
 * completes. Completions can be delivered in any order, which is what
 * out-of-order routing tests need. Synchronous calls run for real. Every
 * op, parked or not, is kept in a history for later assertions.
 */

use super::exec::Executor;
use super::op::{NativeOp, OpKind};
use super::NativeBackend;
use crate::requests::{CompletionToken, Outputs};
use nix::errno::Errno;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::trace;

struct Parked {
    op: NativeOp,
    token: CompletionToken,
}

/// Deterministic backend driven by hand
///
/// Submissions are numbered from zero in submission order. Numbers are
/// never reused, so a test can hold on to them across completions.
#[derive(Default)]
pub struct ManualBackend {
    executor: Executor,
    parked: Mutex<Vec<Option<Parked>>>,
    history: Mutex<Vec<NativeOp>>,
    passthrough: AtomicBool,
}

impl ManualBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submissions ever received
    pub fn submitted(&self) -> usize {
        self.parked.lock().len()
    }

    /// Numbers of the submissions still waiting for a result
    pub fn pending(&self) -> Vec<usize> {
        self.parked
            .lock()
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.as_ref().map(|_| i))
            .collect()
    }

    /// The op of a parked submission
    pub fn op(&self, index: usize) -> Option<NativeOp> {
        self.parked
            .lock()
            .get(index)
            .and_then(|p| p.as_ref().map(|p| p.op.clone()))
    }

    /// Every op received so far, submitted or synchronous, in arrival order
    pub fn history(&self) -> Vec<NativeOp> {
        self.history.lock().clone()
    }

    /// How many ops of `kind` were received
    pub fn count(&self, kind: OpKind) -> usize {
        self.history.lock().iter().filter(|op| op.kind() == kind).count()
    }

    /// Run a parked submission against the real filesystem and complete it
    pub fn perform(&self, index: usize) -> bool {
        let Some(Parked { op, token }) = self.unpark(index) else {
            return false;
        };
        let mut outputs = token.take_outputs();
        let result = self.executor.execute(&op, &mut outputs);
        token.restore_outputs(outputs);
        token.complete(result);
        true
    }

    /// Complete a parked submission with `result` without touching its buffers
    pub fn complete(&self, index: usize, result: i64) -> bool {
        match self.unpark(index) {
            Some(parked) => {
                parked.token.complete(result);
                true
            }
            None => false,
        }
    }

    /// Fail a parked submission with `errno`
    pub fn fail(&self, index: usize, errno: Errno) -> bool {
        self.complete(index, -(errno as i64))
    }

    /// Perform every parked submission in submission order
    pub fn perform_all(&self) -> usize {
        let pending = self.pending();
        pending.iter().filter(|&&i| self.perform(i)).count()
    }

    /// Perform everything parked and stop parking new submissions
    ///
    /// Lets a test hand the rest of a composite operation (follow-up
    /// closes and the like) to the real filesystem.
    pub fn pass_through(&self) -> usize {
        self.passthrough.store(true, Ordering::Release);
        self.perform_all()
    }

    fn unpark(&self, index: usize) -> Option<Parked> {
        let parked = self.parked.lock().get_mut(index).and_then(Option::take);
        if parked.is_some() {
            trace!(index = index, "Releasing parked submission");
        }
        parked
    }
}

impl NativeBackend for ManualBackend {
    fn submit(&self, op: NativeOp, token: CompletionToken) {
        self.history.lock().push(op.clone());
        if self.passthrough.load(Ordering::Acquire) {
            let mut outputs = token.take_outputs();
            let result = self.executor.execute(&op, &mut outputs);
            token.restore_outputs(outputs);
            return token.complete(result);
        }
        self.parked.lock().push(Some(Parked { op, token }));
    }

    fn execute_sync(&self, op: &NativeOp, outputs: &mut Option<Outputs>) -> i64 {
        self.history.lock().push(op.clone());
        self.executor.execute(op, outputs)
    }
}
