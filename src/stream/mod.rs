/*!
 * Stream Engines
 *
 * Sequential reader and writer built from repeated pool-mediated
 * operations. Each engine has at most one request in flight; the next one
 * is issued from the previous continuation.
 *
 * Lifecycle: `Unopened -> Opening -> Streaming -> Draining -> Closed`, with
 * `Errored` reachable from any state before `Closed`. The descriptor is
 * closed exactly once, whichever path gets there first.
 */

mod reader;
mod writer;

pub use reader::{ReadStream, ReadStreamOptions};
pub use writer::{WriteStream, WriteStreamOptions};

use crate::core::{ArgErrorCode, Fd, FsError};
use crate::fs::Fs;
use std::fmt;
use tracing::warn;

/// Lifecycle phase of a stream engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamState {
    Unopened,
    Opening,
    Streaming,
    Draining,
    Closed,
    Errored,
}

impl StreamState {
    /// No further data will flow
    #[inline]
    pub fn is_finished(self) -> bool {
        matches!(self, StreamState::Closed | StreamState::Errored)
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamState::Unopened => "unopened",
            StreamState::Opening => "opening",
            StreamState::Streaming => "streaming",
            StreamState::Draining => "draining",
            StreamState::Closed => "closed",
            StreamState::Errored => "errored",
        };
        f.write_str(name)
    }
}

fn busy_error() -> FsError {
    FsError::invalid_arg(ArgErrorCode::InvalidState, "A stream request is already pending")
}

/// Close `fd` if the engine ever opened one; close failures are only logged
fn release(fs: &Fs, fd: Option<Fd>, done: impl FnOnce() + 'static) {
    match fd {
        Some(fd) => fs.close(fd, move |r| {
            if let Err(e) = r {
                warn!(fd = %fd, error = %e, "Ignoring close failure on stream teardown");
            }
            done()
        }),
        None => done(),
    }
}

/// Blocking variant of `release` used from `Drop`
fn release_sync(fs: &Fs, fd: Option<Fd>) {
    if let Some(fd) = fd {
        if let Err(e) = fs.close_sync(fd) {
            warn!(fd = %fd, error = %e, "Ignoring close failure on dropped stream");
        }
    }
}

impl Fs {
    /// Sequential reader over a byte range of `path`
    pub fn create_read_stream(
        &self,
        path: impl AsRef<std::path::Path>,
        options: ReadStreamOptions,
    ) -> ReadStream {
        ReadStream::new(self, path, options)
    }

    /// Sequential writer to `path`
    pub fn create_write_stream(
        &self,
        path: impl AsRef<std::path::Path>,
        options: WriteStreamOptions,
    ) -> WriteStream {
        WriteStream::new(self, path, options)
    }
}
