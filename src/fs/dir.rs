/*!
 * Directory Iteration
 *
 * An open directory stream fetches entries in batches of
 * `readdir_batch` per native round trip and hands them out one at a time
 * in filesystem order. The stream is closed exactly once: explicitly,
 * when iteration reaches the end, or when the last handle is dropped.
 */

use super::ops::Callback;
use super::promises::promise;
use super::{missing_output, Fs};
use crate::core::{ArgErrorCode, DirHandle, FsError, FsResult};
use crate::decode::{decode_dirents, new_dirent_block, ByteOrder, Dirent};
use crate::native::NativeOp;
use crate::requests::{Completed, Outputs};
use futures::stream::{self, Stream};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::warn;

#[derive(Debug, Default)]
struct Cursor {
    buffered: VecDeque<Dirent>,
    ended: bool,
    closed: bool,
    reading: bool,
}

struct DirInner {
    fs: Fs,
    path: PathBuf,
    handle: DirHandle,
    cursor: RefCell<Cursor>,
}

impl Drop for DirInner {
    fn drop(&mut self) {
        let cursor = self.cursor.get_mut();
        if cursor.closed {
            return;
        }
        cursor.closed = true;
        let op = NativeOp::Closedir { dir: self.handle };
        if let Err(e) = self.fs.execute_sync(&op, &mut None) {
            warn!(path = %self.path.display(), error = %e, "Failed to close dropped directory");
        }
    }
}

/// Open directory stream
pub struct Dir {
    inner: Rc<DirInner>,
}

enum Next {
    Ready(FsResult<Vec<Dirent>>),
    Fetch(DirHandle),
}

impl Dir {
    fn new(fs: Fs, path: PathBuf, handle: DirHandle) -> Self {
        Self {
            inner: Rc::new(DirInner {
                fs,
                path,
                handle,
                cursor: RefCell::new(Cursor::default()),
            }),
        }
    }

    fn share(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Next entry, or `None` once the directory is exhausted
    pub fn read(&self, cb: impl FnOnce(FsResult<Option<Dirent>>) + 'static) {
        self.read_upto(1, move |r| cb(r.map(|batch| batch.into_iter().next())));
    }

    /// Next entry without going through the loop
    pub fn read_sync(&self) -> FsResult<Option<Dirent>> {
        if let Some(entry) = self.take_one()? {
            return Ok(Some(entry));
        }
        let handle = match self.next_step(1) {
            Next::Ready(r) => return r.map(|batch| batch.into_iter().next()),
            Next::Fetch(handle) => handle,
        };

        let mut outputs = Some(Outputs::Dirents(new_dirent_block(
            self.inner.fs.config().readdir_batch,
        )));
        let result = self
            .inner
            .fs
            .execute_sync(&NativeOp::Readdir { dir: handle }, &mut outputs)
            .map(|count| Completed {
                result: count,
                outputs,
            });
        self.fill(result)?;
        self.take_one()
    }

    /// Close the stream; closing twice is a no-op
    pub fn close(&self, cb: impl FnOnce(FsResult<()>) + 'static) {
        if !self.mark_closed() {
            return cb(Ok(()));
        }
        let path = self.inner.path.clone();
        self.inner.fs.submit(
            NativeOp::Closedir {
                dir: self.inner.handle,
            },
            None,
            Box::new(move |r| cb(r.map(|_| ()).map_err(|e| e.with_path(path)))),
        );
    }

    pub fn close_sync(&self) -> FsResult<()> {
        if !self.mark_closed() {
            return Ok(());
        }
        let op = NativeOp::Closedir {
            dir: self.inner.handle,
        };
        self.inner
            .fs
            .execute_sync(&op, &mut None)
            .map_err(|e| e.with_path(&self.inner.path))?;
        Ok(())
    }

    /// Future-returning `read`
    pub async fn next_entry(&self) -> FsResult<Option<Dirent>> {
        promise(|cb| self.read(cb)).await
    }

    /// Future-returning `close`
    pub async fn close_async(&self) -> FsResult<()> {
        promise(|cb| self.close(cb)).await
    }

    /// Entries as an async stream; the directory is closed when it ends
    pub fn into_stream(self) -> impl Stream<Item = FsResult<Dirent>> {
        stream::unfold(Some(self), |dir| async move {
            let dir = dir?;
            match dir.next_entry().await {
                Ok(Some(entry)) => Some((Ok(entry), Some(dir))),
                Ok(None) => match dir.close_async().await {
                    Ok(()) => None,
                    Err(e) => Some((Err(e), None)),
                },
                Err(e) => {
                    if let Err(close_err) = dir.close_async().await {
                        warn!(error = %close_err, "Ignoring close failure after read error");
                    }
                    Some((Err(e), None))
                }
            }
        })
    }

    /// Everything buffered, or the next batch; an empty batch means the end
    fn read_batch(&self, cb: impl FnOnce(FsResult<Vec<Dirent>>) + 'static) {
        self.read_upto(usize::MAX, cb)
    }

    fn read_upto(&self, limit: usize, cb: impl FnOnce(FsResult<Vec<Dirent>>) + 'static) {
        let handle = match self.next_step(limit) {
            Next::Ready(r) => return cb(r),
            Next::Fetch(handle) => handle,
        };

        let batch = self.inner.fs.config().readdir_batch;
        let dir = self.share();
        self.inner.fs.submit(
            NativeOp::Readdir { dir: handle },
            Some(Outputs::Dirents(new_dirent_block(batch))),
            Box::new(move |r| {
                let result = dir.fill(r).map(|_| dir.drain(limit));
                cb(result)
            }),
        );
    }

    /// Decide whether the cursor can answer without a native round trip
    fn next_step(&self, limit: usize) -> Next {
        let mut cursor = self.inner.cursor.borrow_mut();
        if !cursor.buffered.is_empty() {
            drop(cursor);
            return Next::Ready(Ok(self.drain(limit)));
        }
        if cursor.ended {
            return Next::Ready(Ok(Vec::new()));
        }
        if cursor.closed {
            return Next::Ready(Err(closed_error()));
        }
        if cursor.reading {
            return Next::Ready(Err(FsError::invalid_arg(
                ArgErrorCode::InvalidState,
                "A directory read is already pending",
            )));
        }
        cursor.reading = true;
        Next::Fetch(self.inner.handle)
    }

    fn fill(&self, r: FsResult<Completed>) -> FsResult<()> {
        let mut cursor = self.inner.cursor.borrow_mut();
        cursor.reading = false;
        let done = r.map_err(|e| e.with_path(&self.inner.path))?;
        let block = done
            .outputs
            .and_then(Outputs::into_buffer)
            .ok_or_else(|| missing_output("readdir"))?;

        let count = done.result as usize;
        if count == 0 {
            cursor.ended = true;
            return Ok(());
        }
        let entries = decode_dirents(&block, count, &self.inner.path, ByteOrder::native());
        cursor.buffered.extend(entries);
        Ok(())
    }

    fn take_one(&self) -> FsResult<Option<Dirent>> {
        Ok(self.drain(1).into_iter().next())
    }

    fn drain(&self, limit: usize) -> Vec<Dirent> {
        let mut cursor = self.inner.cursor.borrow_mut();
        let n = limit.min(cursor.buffered.len());
        cursor.buffered.drain(..n).collect()
    }

    /// Returns `false` if the stream was already closed
    fn mark_closed(&self) -> bool {
        let mut cursor = self.inner.cursor.borrow_mut();
        !std::mem::replace(&mut cursor.closed, true)
    }
}

impl Iterator for Dir {
    type Item = FsResult<Dirent>;

    /// Synchronous iteration; closes the stream at the end
    fn next(&mut self) -> Option<Self::Item> {
        match self.read_sync() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => self.close_sync().err().map(Err),
            Err(e) => Some(Err(e)),
        }
    }
}

impl std::fmt::Debug for Dir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dir")
            .field("path", &self.inner.path)
            .field("handle", &self.inner.handle)
            .finish()
    }
}

fn closed_error() -> FsError {
    FsError::invalid_arg(ArgErrorCode::InvalidState, "Directory handle was closed")
}

fn collect(dir: Dir, mut acc: Vec<Dirent>, cb: Callback<Vec<Dirent>>) {
    let next = dir.share();
    dir.read_batch(move |r| match r {
        Ok(batch) if batch.is_empty() => next.close(move |closed| cb(closed.map(|_| acc))),
        Ok(batch) => {
            acc.extend(batch);
            collect(next, acc, cb)
        }
        Err(e) => next.close(move |_| cb(Err(e))),
    });
}

impl Fs {
    /// Open a directory stream
    pub fn opendir(&self, path: impl AsRef<Path>, cb: impl FnOnce(FsResult<Dir>) + 'static) {
        let path = path.as_ref().to_path_buf();
        let fs = self.clone();
        self.submit(
            NativeOp::Opendir { path: path.clone() },
            None,
            Box::new(move |r| {
                cb(match r {
                    Ok(done) => Ok(Dir::new(fs, path, DirHandle(done.result as u64))),
                    Err(e) => Err(e.with_path(path)),
                })
            }),
        );
    }

    pub fn opendir_sync(&self, path: impl AsRef<Path>) -> FsResult<Dir> {
        let path = path.as_ref().to_path_buf();
        let handle = self
            .execute_sync(&NativeOp::Opendir { path: path.clone() }, &mut None)
            .map_err(|e| e.with_path(&path))?;
        Ok(Dir::new(self.clone(), path, DirHandle(handle as u64)))
    }

    /// Names of every entry in `path`, in filesystem order
    pub fn readdir(&self, path: impl AsRef<Path>, cb: impl FnOnce(FsResult<Vec<OsString>>) + 'static) {
        self.readdir_with_types(path, move |r| {
            cb(r.map(|entries| entries.into_iter().map(|e| e.name).collect()))
        });
    }

    /// Every entry in `path` with its type, in filesystem order
    pub fn readdir_with_types(
        &self,
        path: impl AsRef<Path>,
        cb: impl FnOnce(FsResult<Vec<Dirent>>) + 'static,
    ) {
        self.opendir(path, move |r| match r {
            Ok(dir) => collect(dir, Vec::new(), Box::new(cb)),
            Err(e) => cb(Err(e)),
        });
    }

    pub fn readdir_sync(&self, path: impl AsRef<Path>) -> FsResult<Vec<OsString>> {
        Ok(self
            .readdir_with_types_sync(path)?
            .into_iter()
            .map(|e| e.name)
            .collect())
    }

    pub fn readdir_with_types_sync(&self, path: impl AsRef<Path>) -> FsResult<Vec<Dirent>> {
        self.opendir_sync(path)?.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FsConfig;
    use crate::native::ManualBackend;
    use futures::StreamExt;
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn populated(n: usize) -> TempDir {
        let dir = TempDir::new().unwrap();
        for i in 0..n {
            std::fs::write(dir.path().join(format!("f{:02}", i)), b"").unwrap();
        }
        dir
    }

    fn names(entries: &[Dirent]) -> BTreeSet<String> {
        entries
            .iter()
            .map(|e| e.name.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_batches_smaller_than_directory() {
        // minimal config reads 4 entries per round trip
        let fs = Fs::builder().with_config(FsConfig::minimal()).build().unwrap();
        let dir = populated(10);

        let entries = fs.readdir_with_types_sync(dir.path()).unwrap();
        assert_eq!(entries.len(), 10);
        assert!(entries.iter().all(Dirent::is_file));
        assert_eq!(names(&entries).len(), 10);
    }

    #[test]
    fn test_async_readdir_matches_sync() {
        let fs = Fs::builder().with_config(FsConfig::minimal()).build().unwrap();
        let dir = populated(9);

        let seen = Rc::new(RefCell::new(None));
        let out = seen.clone();
        fs.readdir_with_types(dir.path(), move |r| *out.borrow_mut() = Some(r));
        fs.run().unwrap();

        let entries = seen.borrow_mut().take().unwrap().unwrap();
        let sync = fs.readdir_with_types_sync(dir.path()).unwrap();
        assert_eq!(entries, sync);
    }

    #[test]
    fn test_stream_closes_at_end() {
        let fs = Fs::builder().with_config(FsConfig::minimal()).build().unwrap();
        let dir = populated(5);

        let opened = fs.opendir_sync(dir.path()).unwrap();
        let entries: Vec<_> = fs
            .block_on(opened.into_stream().collect::<Vec<_>>())
            .unwrap()
            .into_iter()
            .collect::<FsResult<_>>()
            .unwrap();
        assert_eq!(entries.len(), 5);
        assert_eq!(fs.in_flight(), 0);
    }

    #[test]
    fn test_close_is_idempotent() {
        let fs = Fs::builder().with_config(FsConfig::minimal()).build().unwrap();
        let dir = populated(1);
        let opened = fs.opendir_sync(dir.path()).unwrap();
        opened.close_sync().unwrap();
        opened.close_sync().unwrap();
        let err = opened.read_sync().unwrap_err();
        assert_eq!(err.code(), Some("ERR_INVALID_STATE"));
    }

    #[test]
    fn test_second_pending_read_is_rejected() {
        let backend = Arc::new(ManualBackend::new());
        let fs = Fs::builder()
            .with_config(FsConfig::minimal())
            .with_backend(backend.clone())
            .build()
            .unwrap();
        let dir = populated(2);
        let opened = fs.opendir_sync(dir.path()).unwrap();

        opened.read(|_| {});
        let seen = Rc::new(RefCell::new(None));
        let out = seen.clone();
        opened.read(move |r| *out.borrow_mut() = Some(r));
        let err = seen.borrow_mut().take().unwrap().unwrap_err();
        assert_eq!(err.code(), Some("ERR_INVALID_STATE"));

        backend.perform_all();
        fs.run().unwrap();
    }
}
