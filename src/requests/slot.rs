/*!
 * Request Slot
 * One reusable record tracking an in-flight operation
 */

use super::control::{ControlBlock, Outputs};
use crate::core::FsResult;
use crate::native::OpKind;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// What the continuation receives on success
#[derive(Debug)]
pub struct Completed {
    /// Non-negative native result (bytes transferred, descriptor, count, ...)
    pub result: i64,
    /// Buffers retained for the operation, handed back to the caller
    pub outputs: Option<Outputs>,
}

/// Caller callback, invoked exactly once per issued operation
pub type Continuation = Box<dyn FnOnce(FsResult<Completed>)>;

/// A slot detached from the pool by the dispatcher
pub struct Detached {
    pub continuation: Option<Continuation>,
    pub outputs: Option<Outputs>,
    pub op: Option<OpKind>,
    pub issued_at: Option<Instant>,
}

/// Reusable request record
///
/// A slot holds a continuation if and only if it sits in the pool's active
/// prefix.
pub struct Slot {
    control: Arc<ControlBlock>,
    continuation: Option<Continuation>,
    op: Option<OpKind>,
    issued_at: Option<Instant>,
}

impl Slot {
    pub(crate) fn new(id: u32) -> Self {
        Self {
            control: Arc::new(ControlBlock::new(id)),
            continuation: None,
            op: None,
            issued_at: None,
        }
    }

    /// Identity currently mirrored into the control block
    #[inline]
    pub fn identity(&self) -> u32 {
        self.control.id()
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.continuation.is_some()
    }

    pub fn control(&self) -> &Arc<ControlBlock> {
        &self.control
    }

    /// Record the operation about to be handed to the native layer
    pub fn arm(&mut self, op: OpKind, outputs: Option<Outputs>, continuation: Continuation) {
        self.control.retain(outputs);
        self.continuation = Some(continuation);
        self.op = Some(op);
        self.issued_at = Some(Instant::now());
    }

    /// Clear everything so a continuation that re-acquires this slot sees it idle
    pub fn detach(&mut self) -> Detached {
        Detached {
            continuation: self.continuation.take(),
            outputs: self.control.take(),
            op: self.op.take(),
            issued_at: self.issued_at.take(),
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("identity", &self.identity())
            .field("armed", &self.is_armed())
            .field("op", &self.op)
            .finish()
    }
}
