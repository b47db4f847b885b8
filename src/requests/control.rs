/*!
 * Control Blocks and Completion Tokens
 * The part of a request slot the native layer can see
 */

use crate::decode::RawStat;
use bytes::Bytes;
use nix::errno::Errno;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Buffers retained by a slot for the duration of one operation
///
/// The native layer reads from or writes into these, then hands them back
/// through the control block so the continuation receives them.
#[derive(Debug)]
pub enum Outputs {
    /// Read destination
    Buffer(Vec<u8>),
    /// Vectored read destinations
    Buffers(Vec<Vec<u8>>),
    /// Write source
    Source(Bytes),
    /// Vectored write sources
    Sources(Vec<Bytes>),
    /// Raw stat block
    Stat(Box<RawStat>),
    /// NUL-terminated path block (readlink, realpath)
    Path(Vec<u8>),
    /// Raw directory entry batch
    Dirents(Vec<u8>),
}

impl Outputs {
    pub fn into_buffer(self) -> Option<Vec<u8>> {
        match self {
            Outputs::Buffer(b) | Outputs::Path(b) | Outputs::Dirents(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_buffers(self) -> Option<Vec<Vec<u8>>> {
        match self {
            Outputs::Buffers(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_source(self) -> Option<Bytes> {
        match self {
            Outputs::Source(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_sources(self) -> Option<Vec<Bytes>> {
        match self {
            Outputs::Sources(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_stat(self) -> Option<Box<RawStat>> {
        match self {
            Outputs::Stat(b) => Some(b),
            _ => None,
        }
    }
}

/// Raw control record of a slot
///
/// `id` mirrors the slot's current position in the pool. It is rewritten
/// when slots are swapped, so it must be read when a completion is
/// dispatched, not when the request is issued.
#[derive(Debug)]
pub struct ControlBlock {
    id: AtomicU32,
    outputs: Mutex<Option<Outputs>>,
}

impl ControlBlock {
    pub(crate) fn new(id: u32) -> Self {
        Self {
            id: AtomicU32::new(id),
            outputs: Mutex::new(None),
        }
    }

    /// Current identity of the owning slot
    #[inline]
    pub fn id(&self) -> u32 {
        self.id.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_id(&self, id: u32) {
        self.id.store(id, Ordering::Release);
    }

    pub(crate) fn retain(&self, outputs: Option<Outputs>) {
        *self.outputs.lock() = outputs;
    }

    pub(crate) fn take(&self) -> Option<Outputs> {
        self.outputs.lock().take()
    }
}

/// Result of a native operation, routed back to the loop thread
#[derive(Debug)]
pub struct Completion {
    pub(crate) control: Arc<ControlBlock>,
    pub(crate) result: i64,
}

impl Completion {
    #[inline]
    pub fn result(&self) -> i64 {
        self.result
    }
}

/// Handle the native layer uses to finish exactly one operation
///
/// A token dropped without `complete` reports `ECANCELED`, so an active slot
/// is never silently lost.
#[derive(Debug)]
pub struct CompletionToken {
    control: Arc<ControlBlock>,
    sink: Option<flume::Sender<Completion>>,
}

impl CompletionToken {
    pub(crate) fn new(control: Arc<ControlBlock>, sink: flume::Sender<Completion>) -> Self {
        Self {
            control,
            sink: Some(sink),
        }
    }

    /// Borrow the retained buffers for the operation
    pub fn take_outputs(&self) -> Option<Outputs> {
        self.control.take()
    }

    /// Hand the buffers back before completing
    pub fn restore_outputs(&self, outputs: Option<Outputs>) {
        self.control.retain(outputs);
    }

    /// Report the signed result: negative errno on failure
    pub fn complete(mut self, result: i64) {
        self.send(result);
    }

    fn send(&mut self, result: i64) {
        if let Some(sink) = self.sink.take() {
            let completion = Completion {
                control: self.control.clone(),
                result,
            };
            if sink.send(completion).is_err() {
                warn!(result = result, "Completion dropped: event loop is gone");
            }
        }
    }
}

impl Drop for CompletionToken {
    fn drop(&mut self) {
        if self.sink.is_some() {
            warn!("Completion token dropped without a result, reporting ECANCELED");
            self.send(-(Errno::ECANCELED as i64));
        }
    }
}
