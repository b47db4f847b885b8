/*!
 * Sequential Writer
 *
 * Buffers queued by `write` are drained in cycles: each cycle hands the
 * whole queue to one vectored write and re-issues whatever a short write
 * left over before starting the next cycle. Writes on the descriptor are
 * therefore never interleaved.
 *
 * While a step is in flight `destroy` only cancels the queue; the step's
 * continuation closes the descriptor and runs the deferred callbacks.
 */

use super::{release, release_sync, StreamState};
use crate::core::limits::DEFAULT_FILE_MODE;
use crate::core::{ArgErrorCode, Fd, FsError, FsResult};
use crate::fs::{promise, Callback, Fs, OpenFlags, Pending};
use bytes::Bytes;
use futures::{ready, FutureExt, Sink};
use nix::fcntl::OFlag;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use tracing::debug;

/// How a write stream opens its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteStreamOptions {
    pub flags: OpenFlags,
    pub mode: u32,
}

impl Default for WriteStreamOptions {
    /// Truncate or create, like the "w" flag string
    fn default() -> Self {
        Self {
            flags: OpenFlags::from(OFlag::O_TRUNC | OFlag::O_CREAT | OFlag::O_WRONLY),
            mode: DEFAULT_FILE_MODE,
        }
    }
}

struct Queued {
    data: Bytes,
    cb: Option<Callback<()>>,
}

#[derive(Default)]
struct Waiters(Vec<Callback<()>>);

impl Waiters {
    fn settle(self, result: &FsResult<()>) {
        for cb in self.0 {
            cb(result.clone());
        }
    }
}

struct Cursor {
    state: StreamState,
    fd: Option<Fd>,
    queue: Vec<Queued>,
    queued_bytes: usize,
    written: u64,
    busy: bool,
    ending: bool,
    enders: Waiters,
    flushers: Waiters,
    destroyers: Vec<Box<dyn FnOnce()>>,
    error: Option<FsError>,
}

enum Step {
    Idle(Waiters),
    Open,
    Write(Fd, Vec<Queued>),
    Close(Option<Fd>),
}

struct Inner {
    fs: Fs,
    path: PathBuf,
    options: WriteStreamOptions,
    cursor: RefCell<Cursor>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let fd = self.cursor.get_mut().fd.take();
        release_sync(&self.fs, fd);
    }
}

/// Sequential writer
pub struct WriteStream {
    inner: Rc<Inner>,
    flushing: Option<Pending<()>>,
    closing: Option<Pending<()>>,
}

impl WriteStream {
    pub fn new(fs: &Fs, path: impl AsRef<Path>, options: WriteStreamOptions) -> Self {
        Self {
            inner: Rc::new(Inner {
                fs: fs.clone(),
                path: path.as_ref().to_path_buf(),
                options,
                cursor: RefCell::new(Cursor {
                    state: StreamState::Unopened,
                    fd: None,
                    queue: Vec::new(),
                    queued_bytes: 0,
                    written: 0,
                    busy: false,
                    ending: false,
                    enders: Waiters::default(),
                    flushers: Waiters::default(),
                    destroyers: Vec::new(),
                    error: None,
                }),
            }),
            flushing: None,
            closing: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn state(&self) -> StreamState {
        self.inner.cursor.borrow().state
    }

    /// Bytes the native layer has accepted so far
    pub fn bytes_written(&self) -> u64 {
        self.inner.cursor.borrow().written
    }

    /// Queue `data`; `cb` runs once it has been written
    pub fn write(&self, data: impl Into<Bytes>, cb: impl FnOnce(FsResult<()>) + 'static) {
        self.inner.enqueue(data.into(), Some(Box::new(cb)));
    }

    pub fn write_async(&self, data: impl Into<Bytes>) -> Pending<()> {
        promise(|cb| self.inner.enqueue(data.into(), Some(cb)))
    }

    /// Runs `cb` once everything queued so far is written
    pub fn flush(&self, cb: impl FnOnce(FsResult<()>) + 'static) {
        self.inner.flush(Box::new(cb));
    }

    /// Write everything queued, then close; `cb` gets the close result
    pub fn end(&self, cb: impl FnOnce(FsResult<()>) + 'static) {
        self.inner.end(Box::new(cb));
    }

    pub fn end_async(&self) -> Pending<()> {
        promise(|cb| self.inner.end(cb))
    }

    /// Drop queued data and close the descriptor; safe to call repeatedly
    ///
    /// `cb` runs once the descriptor is closed, which waits for the write
    /// or close already in flight.
    pub fn destroy(&self, cb: impl FnOnce() + 'static) {
        let (queue, enders, flushers) = {
            let mut cursor = self.inner.cursor.borrow_mut();
            if !cursor.state.is_finished() {
                cursor.state = StreamState::Closed;
            }
            cursor.queued_bytes = 0;
            cursor.destroyers.push(Box::new(cb));
            (
                std::mem::take(&mut cursor.queue),
                std::mem::take(&mut cursor.enders),
                std::mem::take(&mut cursor.flushers),
            )
        };
        let canceled = Err(FsError::Canceled);
        settle_queue(queue, &canceled);
        enders.settle(&canceled);
        flushers.settle(&canceled);
        let busy = self.inner.cursor.borrow().busy;
        if !busy {
            self.inner.teardown();
        }
    }
}

fn settle_queue(queue: Vec<Queued>, result: &FsResult<()>) {
    for cb in queue.into_iter().filter_map(|q| q.cb) {
        cb(result.clone());
    }
}

fn after_end() -> FsError {
    FsError::invalid_arg(ArgErrorCode::InvalidState, "Write after end")
}

impl Inner {
    fn enqueue(self: &Rc<Self>, data: Bytes, cb: Option<Callback<()>>) {
        let rejected = {
            let cursor = self.cursor.borrow();
            if let Some(err) = &cursor.error {
                Some(err.clone())
            } else if cursor.ending || cursor.state.is_finished() {
                Some(after_end())
            } else {
                None
            }
        };
        if let Some(err) = rejected {
            if let Some(cb) = cb {
                cb(Err(err));
            }
            return;
        }
        {
            let mut cursor = self.cursor.borrow_mut();
            cursor.queued_bytes += data.len();
            cursor.queue.push(Queued { data, cb });
        }
        self.pump();
    }

    fn flush(self: &Rc<Self>, cb: Callback<()>) {
        {
            let mut cursor = self.cursor.borrow_mut();
            if let Some(err) = cursor.error.clone() {
                drop(cursor);
                return cb(Err(err));
            }
            if cursor.state == StreamState::Closed {
                drop(cursor);
                return cb(Ok(()));
            }
            cursor.flushers.0.push(cb);
        }
        self.pump();
    }

    fn end(self: &Rc<Self>, cb: Callback<()>) {
        {
            let mut cursor = self.cursor.borrow_mut();
            let state = cursor.state;
            match state {
                StreamState::Errored => {
                    let err = cursor.error.clone().unwrap_or(FsError::Canceled);
                    drop(cursor);
                    return cb(Err(err));
                }
                StreamState::Closed => {
                    drop(cursor);
                    return cb(Ok(()));
                }
                _ => {
                    cursor.ending = true;
                    cursor.enders.0.push(cb);
                }
            }
        }
        self.pump();
    }

    /// Start the next step unless one is already in flight
    fn pump(self: &Rc<Self>) {
        let step = {
            let mut guard = self.cursor.borrow_mut();
            let cursor = &mut *guard;
            let state = cursor.state;
            if cursor.busy || state.is_finished() {
                return;
            }
            match state {
                StreamState::Unopened if !cursor.queue.is_empty() || cursor.ending => {
                    cursor.state = StreamState::Opening;
                    cursor.busy = true;
                    Step::Open
                }
                StreamState::Streaming if !cursor.queue.is_empty() => {
                    cursor.busy = true;
                    cursor.queued_bytes = 0;
                    match cursor.fd {
                        Some(fd) => Step::Write(fd, std::mem::take(&mut cursor.queue)),
                        None => Step::Close(None),
                    }
                }
                StreamState::Streaming if cursor.ending => {
                    cursor.state = StreamState::Draining;
                    cursor.busy = true;
                    Step::Close(cursor.fd.take())
                }
                _ if cursor.queue.is_empty() => Step::Idle(std::mem::take(&mut cursor.flushers)),
                _ => Step::Idle(Waiters::default()),
            }
        };

        match step {
            Step::Idle(flushers) => flushers.settle(&Ok(())),
            Step::Open => self.open(),
            Step::Write(fd, batch) => {
                let (data, cbs): (Vec<Bytes>, Vec<Option<Callback<()>>>) =
                    batch.into_iter().map(|q| (q.data, q.cb)).unzip();
                self.write_batch(fd, data, cbs.into_iter().flatten().collect());
            }
            Step::Close(fd) => self.close(fd),
        }
    }

    fn open(self: &Rc<Self>) {
        let inner = self.clone();
        let WriteStreamOptions { flags, mode } = self.options;
        self.fs.open(&self.path, flags, mode, move |r| {
            let fd = match r {
                Ok(fd) => fd,
                Err(e) => return inner.fail(e),
            };
            {
                let mut cursor = inner.cursor.borrow_mut();
                cursor.fd = Some(fd);
                if cursor.state == StreamState::Closed {
                    // Destroyed while opening
                    drop(cursor);
                    return inner.teardown();
                }
                cursor.busy = false;
                cursor.state = StreamState::Streaming;
            }
            debug!(path = %inner.path.display(), fd = %fd, "Write stream opened");
            inner.pump();
        });
    }

    /// One vectored write; a short write re-issues the remainder
    fn write_batch(self: &Rc<Self>, fd: Fd, data: Vec<Bytes>, cbs: Vec<Callback<()>>) {
        let inner = self.clone();
        let retained = data.clone();
        self.fs.writev(fd, data, None, move |r| {
            let n = match r {
                Ok(n) => n,
                Err(e) => {
                    let failed = Err(e.clone());
                    for cb in cbs {
                        cb(failed.clone());
                    }
                    return inner.fail(e);
                }
            };
            if inner.cursor.borrow().state == StreamState::Closed {
                for cb in cbs {
                    cb(Err(FsError::Canceled));
                }
                return inner.teardown();
            }

            inner.cursor.borrow_mut().written += n as u64;
            let rest = remainder(retained, n);
            if n == 0 && !rest.is_empty() {
                let err = inner.fs.no_progress_error();
                for cb in cbs {
                    cb(Err(err.clone()));
                }
                return inner.fail(err);
            }
            if !rest.is_empty() {
                debug!(fd = %fd, written = n, "Short write, re-issuing remainder");
                return inner.write_batch(fd, rest, cbs);
            }

            inner.cursor.borrow_mut().busy = false;
            for cb in cbs {
                cb(Ok(()));
            }
            inner.pump();
        });
    }

    fn close(self: &Rc<Self>, fd: Option<Fd>) {
        let inner = self.clone();
        let finish = move |result: FsResult<()>| {
            let (enders, flushers, destroyers) = {
                let mut cursor = inner.cursor.borrow_mut();
                cursor.busy = false;
                cursor.state = match result {
                    Ok(()) => StreamState::Closed,
                    Err(_) => StreamState::Errored,
                };
                cursor.error = result.clone().err();
                (
                    std::mem::take(&mut cursor.enders),
                    std::mem::take(&mut cursor.flushers),
                    std::mem::take(&mut cursor.destroyers),
                )
            };
            enders.settle(&result);
            flushers.settle(&result);
            for cb in destroyers {
                cb();
            }
        };
        match fd {
            Some(fd) => self.fs.close(fd, finish),
            None => finish(Ok(())),
        }
    }

    fn fail(self: &Rc<Self>, err: FsError) {
        let (queue, enders, flushers) = {
            let mut cursor = self.cursor.borrow_mut();
            // A destroyed stream stays closed
            if cursor.state != StreamState::Closed {
                cursor.state = StreamState::Errored;
                cursor.error = Some(err.clone());
            }
            cursor.queued_bytes = 0;
            (
                std::mem::take(&mut cursor.queue),
                std::mem::take(&mut cursor.enders),
                std::mem::take(&mut cursor.flushers),
            )
        };
        let failed = Err(err);
        settle_queue(queue, &failed);
        enders.settle(&failed);
        flushers.settle(&failed);
        self.teardown();
    }

    /// Close the descriptor if one is left, then run deferred `destroy`
    /// callbacks. The stream stays busy until the close completes.
    fn teardown(self: &Rc<Self>) {
        let fd = {
            let mut cursor = self.cursor.borrow_mut();
            cursor.busy = true;
            cursor.fd.take()
        };
        let inner = self.clone();
        release(&self.fs, fd, move || {
            let destroyers = {
                let mut cursor = inner.cursor.borrow_mut();
                cursor.busy = false;
                std::mem::take(&mut cursor.destroyers)
            };
            for cb in destroyers {
                cb();
            }
        });
    }

    fn needs_drain(&self) -> FsResult<bool> {
        let cursor = self.cursor.borrow();
        if let Some(err) = &cursor.error {
            return Err(err.clone());
        }
        Ok(cursor.queued_bytes >= self.fs.config().stream_chunk_size)
    }
}

/// What is left of `batch` after the first `written` bytes
fn remainder(batch: Vec<Bytes>, mut written: usize) -> Vec<Bytes> {
    let mut rest = Vec::new();
    for buf in batch {
        if written >= buf.len() {
            written -= buf.len();
            continue;
        }
        rest.push(buf.slice(written..));
        written = 0;
    }
    rest
}

impl WriteStream {
    fn poll_pending(
        slot: &mut Option<Pending<()>>,
        cx: &mut Context<'_>,
        issue: impl FnOnce() -> Pending<()>,
    ) -> Poll<FsResult<()>> {
        let pending = slot.get_or_insert_with(issue);
        let result = ready!(pending.poll_unpin(cx));
        *slot = None;
        Poll::Ready(result)
    }
}

/// Backpressure: `poll_ready` waits for a flush once `stream_chunk_size`
/// bytes are queued
impl Sink<Bytes> for WriteStream {
    type Error = FsError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<FsResult<()>> {
        let this = self.get_mut();
        if this.flushing.is_none() && !this.inner.needs_drain()? {
            return Poll::Ready(Ok(()));
        }
        let inner = &this.inner;
        Self::poll_pending(&mut this.flushing, cx, || promise(|cb| inner.flush(cb)))
    }

    fn start_send(self: Pin<&mut Self>, item: Bytes) -> FsResult<()> {
        let inner = &self.inner;
        if inner.cursor.borrow().ending {
            return Err(after_end());
        }
        inner.enqueue(item, None);
        match inner.cursor.borrow().error.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<FsResult<()>> {
        let this = self.get_mut();
        let inner = &this.inner;
        Self::poll_pending(&mut this.flushing, cx, || promise(|cb| inner.flush(cb)))
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<FsResult<()>> {
        let this = self.get_mut();
        let inner = &this.inner;
        Self::poll_pending(&mut this.closing, cx, || promise(|cb| inner.end(cb)))
    }
}

impl std::fmt::Debug for WriteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cursor = self.inner.cursor.borrow();
        f.debug_struct("WriteStream")
            .field("path", &self.inner.path)
            .field("state", &cursor.state)
            .field("fd", &cursor.fd)
            .field("queued", &cursor.queue.len())
            .field("written", &cursor.written)
            .finish()
    }
}
