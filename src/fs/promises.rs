/*!
 * Future-Returning Façade
 *
 * Every operation is issued when the method is called, like the callback
 * form; the returned `Pending` only waits for the completion. Futures are
 * driven by `Fs::run`, `Fs::block_on` or tasks spawned with `Fs::spawn`.
 */

use super::flags::OpenFlags;
use super::ops::{check_window, Callback};
use super::tree::{CpOptions, MkdirOptions, RmOptions};
use super::{Dir, Fs};
use crate::core::{Fd, FsError, FsResult, Position};
use crate::decode::{Dirent, Stats};
use bytes::Bytes;
use futures::channel::oneshot;
use futures::FutureExt;
use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

/// Issue a callback operation now and return its pending result
pub(crate) fn promise<T: 'static>(issue: impl FnOnce(Callback<T>)) -> Pending<T> {
    let (tx, rx) = oneshot::channel();
    issue(Box::new(move |r| {
        // Receiver gone means nobody is waiting
        let _ = tx.send(r);
    }));
    Pending(State::Waiting(rx))
}

enum State<T> {
    Waiting(oneshot::Receiver<FsResult<T>>),
    Failed(Option<FsError>),
}

/// Result of an operation that has already been issued
///
/// Dropping it does not cancel the operation. Resolves to
/// `FsError::Canceled` if the operation's callback is dropped uncalled.
#[must_use = "the operation runs regardless; drop the future to ignore its result"]
pub struct Pending<T>(State<T>);

impl<T> Pending<T> {
    fn failed(err: FsError) -> Self {
        Pending(State::Failed(Some(err)))
    }
}

impl<T> Future for Pending<T> {
    type Output = FsResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().0 {
            State::Waiting(rx) => rx.poll_unpin(cx).map(|r| r.unwrap_or(Err(FsError::Canceled))),
            State::Failed(err) => Poll::Ready(Err(err.take().unwrap_or(FsError::Canceled))),
        }
    }
}

impl<T> std::fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.0 {
            State::Waiting(_) => "waiting",
            State::Failed(_) => "failed",
        };
        f.debug_tuple("Pending").field(&state).finish()
    }
}

/// Async view of an `Fs`
#[derive(Clone, Debug)]
pub struct Promises {
    fs: Fs,
}

impl Fs {
    pub fn promises(&self) -> Promises {
        Promises { fs: self.clone() }
    }
}

impl Promises {
    pub fn fs(&self) -> &Fs {
        &self.fs
    }

    pub fn open(&self, path: impl AsRef<Path>, flags: OpenFlags, mode: u32) -> Pending<Fd> {
        promise(|cb| self.fs.open(path, flags, mode, cb))
    }

    pub fn close(&self, fd: Fd) -> Pending<()> {
        promise(|cb| self.fs.close(fd, cb))
    }

    /// Resolves to the byte count and the buffer
    ///
    /// A bad window fails the future without issuing anything.
    pub fn read(
        &self,
        fd: Fd,
        buf: Vec<u8>,
        offset: usize,
        len: usize,
        position: Position,
    ) -> Pending<(usize, Vec<u8>)> {
        match check_window(buf.len(), offset, len) {
            Ok(()) => promise(|cb| self.fs.read_window(fd, buf, offset, len, position, cb)),
            Err(e) => Pending::failed(e),
        }
    }

    pub fn readv(
        &self,
        fd: Fd,
        bufs: Vec<Vec<u8>>,
        position: Position,
    ) -> Pending<(usize, Vec<Vec<u8>>)> {
        promise(|cb| self.fs.readv(fd, bufs, position, cb))
    }

    pub fn write(&self, fd: Fd, data: impl Into<Bytes>, position: Position) -> Pending<usize> {
        promise(|cb| self.fs.write(fd, data, position, cb))
    }

    pub fn writev(&self, fd: Fd, data: Vec<Bytes>, position: Position) -> Pending<usize> {
        promise(|cb| self.fs.writev(fd, data, position, cb))
    }

    pub fn ftruncate(&self, fd: Fd, len: u64) -> Pending<()> {
        promise(|cb| self.fs.ftruncate(fd, len, cb))
    }

    pub fn fchmod(&self, fd: Fd, mode: u32) -> Pending<()> {
        promise(|cb| self.fs.fchmod(fd, mode, cb))
    }

    pub fn chmod(&self, path: impl AsRef<Path>, mode: u32) -> Pending<()> {
        promise(|cb| self.fs.chmod(path, mode, cb))
    }

    pub fn stat(&self, path: impl AsRef<Path>) -> Pending<Stats> {
        promise(|cb| self.fs.stat(path, cb))
    }

    pub fn lstat(&self, path: impl AsRef<Path>) -> Pending<Stats> {
        promise(|cb| self.fs.lstat(path, cb))
    }

    pub fn fstat(&self, fd: Fd) -> Pending<Stats> {
        promise(|cb| self.fs.fstat(fd, cb))
    }

    pub fn mkdir(&self, path: impl AsRef<Path>, options: MkdirOptions) -> Pending<()> {
        promise(|cb| self.fs.mkdir(path, options, cb))
    }

    pub fn rmdir(&self, path: impl AsRef<Path>) -> Pending<()> {
        promise(|cb| self.fs.rmdir(path, cb))
    }

    pub fn unlink(&self, path: impl AsRef<Path>) -> Pending<()> {
        promise(|cb| self.fs.unlink(path, cb))
    }

    pub fn rename(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> Pending<()> {
        promise(|cb| self.fs.rename(from, to, cb))
    }

    pub fn symlink(&self, target: impl AsRef<Path>, path: impl AsRef<Path>) -> Pending<()> {
        promise(|cb| self.fs.symlink(target, path, cb))
    }

    pub fn readlink(&self, path: impl AsRef<Path>) -> Pending<PathBuf> {
        promise(|cb| self.fs.readlink(path, cb))
    }

    pub fn realpath(&self, path: impl AsRef<Path>) -> Pending<PathBuf> {
        promise(|cb| self.fs.realpath(path, cb))
    }

    pub fn copy_file(
        &self,
        src: impl AsRef<Path>,
        dst: impl AsRef<Path>,
        flags: u32,
    ) -> Pending<()> {
        promise(|cb| self.fs.copy_file(src, dst, flags, cb))
    }

    pub fn access(&self, path: impl AsRef<Path>, mode: i32) -> Pending<()> {
        promise(|cb| self.fs.access(path, mode, cb))
    }

    pub async fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.access(path, super::F_OK).await.is_ok()
    }

    pub fn opendir(&self, path: impl AsRef<Path>) -> Pending<Dir> {
        promise(|cb| self.fs.opendir(path, cb))
    }

    pub fn readdir(&self, path: impl AsRef<Path>) -> Pending<Vec<OsString>> {
        promise(|cb| self.fs.readdir(path, cb))
    }

    pub fn readdir_with_types(&self, path: impl AsRef<Path>) -> Pending<Vec<Dirent>> {
        promise(|cb| self.fs.readdir_with_types(path, cb))
    }

    pub fn read_file(&self, path: impl AsRef<Path>) -> Pending<Vec<u8>> {
        promise(|cb| self.fs.read_file(path, cb))
    }

    pub fn write_file(&self, path: impl AsRef<Path>, data: impl Into<Bytes>) -> Pending<()> {
        promise(|cb| self.fs.write_file(path, data, cb))
    }

    pub fn append_file(&self, path: impl AsRef<Path>, data: impl Into<Bytes>) -> Pending<()> {
        promise(|cb| self.fs.append_file(path, data, cb))
    }

    pub fn rm(&self, path: impl AsRef<Path>, options: RmOptions) -> Pending<()> {
        promise(|cb| self.fs.rm(path, options, cb))
    }

    pub fn cp(
        &self,
        src: impl AsRef<Path>,
        dst: impl AsRef<Path>,
        options: CpOptions,
    ) -> Pending<()> {
        promise(|cb| self.fs.cp(src, dst, options, cb))
    }
}
