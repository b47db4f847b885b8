/*!
 * Sequential Reader
 *
 * Reads a byte window `[start, start + length)` of a regular file one
 * bounded chunk per demand. The window is clamped to the file size learned
 * from `fstat` on open: a file shorter than `start` yields nothing, one
 * shorter than the window end yields everything up to EOF.
 *
 * A `destroy` that arrives while a request is in flight only marks the
 * stream closed. The continuation of that request closes the descriptor
 * and then runs the deferred destroy callbacks.
 */

use super::{busy_error, release, release_sync, StreamState};
use crate::core::limits::DEFAULT_FILE_MODE;
use crate::core::{Fd, FsError, FsResult};
use crate::fs::{promise, Callback, Fs, OpenFlags, Pending};
use bytes::Bytes;
use futures::ready;
use futures::{FutureExt, Stream};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use tracing::debug;

/// Byte window of a read stream
///
/// `length` wins over `end`; `end` is inclusive. With neither, the stream
/// runs to EOF.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadStreamOptions {
    pub start: u64,
    pub length: Option<u64>,
    pub end: Option<u64>,
}

impl ReadStreamOptions {
    /// Bytes requested past `start`, `None` meaning "to EOF"
    fn window(&self) -> Option<u64> {
        match (self.length, self.end) {
            (Some(len), _) if len > 0 => Some(len),
            (_, Some(end)) => Some((end + 1).saturating_sub(self.start)),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Cursor {
    state: StreamState,
    fd: Option<Fd>,
    offset: u64,
    missing: Option<u64>,
    pending: bool,
    error: Option<FsError>,
}

struct Inner {
    fs: Fs,
    path: PathBuf,
    cursor: RefCell<Cursor>,
    destroyers: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let fd = self.cursor.get_mut().fd.take();
        release_sync(&self.fs, fd);
    }
}

/// Bounded sequential reader
pub struct ReadStream {
    inner: Rc<Inner>,
    demand: Option<Pending<Option<Bytes>>>,
    exhausted: bool,
}

impl ReadStream {
    pub fn new(fs: &Fs, path: impl AsRef<Path>, options: ReadStreamOptions) -> Self {
        Self {
            inner: Rc::new(Inner {
                fs: fs.clone(),
                path: path.as_ref().to_path_buf(),
                cursor: RefCell::new(Cursor {
                    state: StreamState::Unopened,
                    fd: None,
                    offset: options.start,
                    missing: options.window(),
                    pending: false,
                    error: None,
                }),
                destroyers: RefCell::new(Vec::new()),
            }),
            demand: None,
            exhausted: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn state(&self) -> StreamState {
        self.inner.cursor.borrow().state
    }

    /// Next chunk, or `None` at the end of the window
    ///
    /// Opens the file on first demand. Only one demand may be pending.
    pub fn read(&self, cb: impl FnOnce(FsResult<Option<Bytes>>) + 'static) {
        self.inner.read(Box::new(cb));
    }

    /// Future-returning `read`
    pub fn next_chunk(&self) -> Pending<Option<Bytes>> {
        promise(|cb| self.read(cb))
    }

    /// Stop reading and close the descriptor; safe to call repeatedly
    ///
    /// `cb` runs once the descriptor is closed. With a request in flight
    /// that happens after the request completes.
    pub fn destroy(&self, cb: impl FnOnce() + 'static) {
        let fd = {
            let mut cursor = self.inner.cursor.borrow_mut();
            if !cursor.state.is_finished() {
                cursor.state = StreamState::Closed;
            }
            if cursor.pending {
                self.inner.destroyers.borrow_mut().push(Box::new(cb));
                return;
            }
            cursor.fd.take()
        };
        release(&self.inner.fs, fd, cb);
    }
}

impl Inner {
    fn read(self: &Rc<Self>, cb: Callback<Option<Bytes>>) {
        let state = {
            let mut cursor = self.cursor.borrow_mut();
            if cursor.pending {
                drop(cursor);
                return cb(Err(busy_error()));
            }
            if cursor.state == StreamState::Unopened {
                cursor.state = StreamState::Opening;
            }
            cursor.pending = !cursor.state.is_finished();
            cursor.state
        };

        match state {
            StreamState::Opening => self.open(cb),
            StreamState::Streaming => self.chunk(cb),
            StreamState::Errored => {
                let err = self.cursor.borrow().error.clone();
                cb(Err(err.unwrap_or(FsError::Canceled)))
            }
            _ => cb(Ok(None)),
        }
    }

    fn open(self: &Rc<Self>, cb: Callback<Option<Bytes>>) {
        let inner = self.clone();
        self.fs.open(&self.path, OpenFlags::READ, DEFAULT_FILE_MODE, move |r| {
            let fd = match r {
                Ok(fd) => fd,
                Err(e) => return inner.fail(None, e, cb),
            };
            if inner.cursor.borrow().state == StreamState::Closed {
                // Destroyed while opening
                return inner.finish(Some(fd), cb);
            }
            let stat_inner = inner.clone();
            inner.fs.fstat(fd, move |st| {
                let inner = stat_inner;
                let st = match st {
                    Ok(st) => st,
                    Err(e) => return inner.fail(Some(fd), e, cb),
                };
                if !st.is_file() {
                    let err = FsError::NotAFile(inner.path.clone());
                    return inner.fail(Some(fd), err, cb);
                }
                {
                    let mut cursor = inner.cursor.borrow_mut();
                    cursor.fd = Some(fd);
                    if cursor.state == StreamState::Opening {
                        cursor.state = StreamState::Streaming;
                    }
                    clamp(&mut cursor, st.size);
                    debug!(
                        path = %inner.path.display(),
                        offset = cursor.offset,
                        missing = ?cursor.missing,
                        "Read stream opened"
                    );
                }
                inner.chunk(cb)
            });
        });
    }

    /// Issue one bounded read at the current offset
    fn chunk(self: &Rc<Self>, cb: Callback<Option<Bytes>>) {
        let (fd, offset, missing, state) = {
            let cursor = self.cursor.borrow();
            (cursor.fd, cursor.offset, cursor.missing.unwrap_or(0), cursor.state)
        };
        let fd = match fd {
            Some(fd) if missing > 0 && state == StreamState::Streaming => fd,
            _ => return self.drain(cb),
        };
        let len = missing.min(self.fs.config().stream_chunk_size as u64) as usize;

        let inner = self.clone();
        self.fs.read_chunk(fd, len, offset, move |r| match r {
            Err(e) => {
                let fd = inner.cursor.borrow_mut().fd.take();
                inner.fail(fd, e, cb)
            }
            Ok(buf) if buf.is_empty() => inner.drain(cb),
            Ok(_) if inner.cursor.borrow().state == StreamState::Closed => inner.drain(cb),
            Ok(mut buf) => {
                let mut cursor = inner.cursor.borrow_mut();
                cursor.pending = false;
                let missing = cursor.missing.unwrap_or(0);
                buf.truncate(missing.min(buf.len() as u64) as usize);
                cursor.missing = Some(missing - buf.len() as u64);
                cursor.offset += buf.len() as u64;
                drop(cursor);
                cb(Ok(Some(Bytes::from(buf))))
            }
        });
    }

    /// End of window: close the descriptor, then report end-of-stream
    fn drain(self: &Rc<Self>, cb: Callback<Option<Bytes>>) {
        let fd = {
            let mut cursor = self.cursor.borrow_mut();
            if cursor.state == StreamState::Streaming {
                cursor.state = StreamState::Draining;
            }
            cursor.fd.take()
        };
        self.finish(fd, cb)
    }

    fn finish(self: &Rc<Self>, fd: Option<Fd>, cb: Callback<Option<Bytes>>) {
        let inner = self.clone();
        release(&self.fs, fd, move || {
            {
                let mut cursor = inner.cursor.borrow_mut();
                cursor.pending = false;
                if !cursor.state.is_finished() {
                    cursor.state = StreamState::Closed;
                }
            }
            inner.run_destroyers();
            cb(Ok(None))
        });
    }

    fn fail(self: &Rc<Self>, fd: Option<Fd>, err: FsError, cb: Callback<Option<Bytes>>) {
        if self.cursor.borrow().state == StreamState::Closed {
            // Destroyed while the failing request was in flight
            return self.finish(fd, cb);
        }
        let inner = self.clone();
        release(&self.fs, fd, move || {
            {
                let mut cursor = inner.cursor.borrow_mut();
                cursor.pending = false;
                if cursor.state != StreamState::Closed {
                    cursor.state = StreamState::Errored;
                    cursor.error = Some(err.clone());
                }
            }
            inner.run_destroyers();
            cb(Err(err))
        });
    }

    fn run_destroyers(&self) {
        let destroyers = std::mem::take(&mut *self.destroyers.borrow_mut());
        for cb in destroyers {
            cb();
        }
    }
}

/// Fit the requested window to a file of `size` bytes
fn clamp(cursor: &mut Cursor, size: u64) {
    if size < cursor.offset {
        cursor.offset = size;
        cursor.missing = Some(0);
        return;
    }
    let available = size - cursor.offset;
    cursor.missing = Some(cursor.missing.map_or(available, |m| m.min(available)));
}

impl Fs {
    /// Positioned read of up to `len` bytes into a fresh buffer
    fn read_chunk(&self, fd: Fd, len: usize, offset: u64, cb: impl FnOnce(FsResult<Vec<u8>>) + 'static) {
        let buf = vec![0; len];
        self.read_window(fd, buf, 0, len, Some(offset), move |r| {
            cb(r.map(|(n, mut buf)| {
                buf.truncate(n);
                buf
            }))
        });
    }
}

impl Stream for ReadStream {
    type Item = FsResult<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.exhausted {
            return Poll::Ready(None);
        }
        let inner = &this.inner;
        let demand = this
            .demand
            .get_or_insert_with(|| promise(|cb| inner.read(cb)));
        let result = ready!(demand.poll_unpin(cx));
        this.demand = None;

        let item = result.transpose();
        if !matches!(item, Some(Ok(_))) {
            this.exhausted = true;
        }
        Poll::Ready(item)
    }
}

impl std::fmt::Debug for ReadStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadStream")
            .field("path", &self.inner.path)
            .field("cursor", &self.inner.cursor.borrow())
            .finish()
    }
}
