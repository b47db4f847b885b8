/*!
 * Whole-File Operations
 *
 * Built from the primitives: open, fstat, a read or write loop that
 * continues after partial transfers, then close. Each step is issued only
 * after the previous one completed, so one file is never touched by two
 * requests at once.
 */

use super::flags::OpenFlags;
use super::ops::Callback;
use super::Fs;
use crate::core::limits::DEFAULT_FILE_MODE;
use crate::core::{Fd, FsError, FsResult};
use bytes::Bytes;
use nix::errno::Errno;
use nix::fcntl::OFlag;
use std::path::Path;
use tracing::warn;

fn write_flags() -> OpenFlags {
    OpenFlags::from(OFlag::O_TRUNC | OFlag::O_CREAT | OFlag::O_WRONLY)
}

fn append_flags() -> OpenFlags {
    OpenFlags::from(OFlag::O_APPEND | OFlag::O_CREAT | OFlag::O_WRONLY)
}

/// Close after a failure; the close result never replaces the original error
fn close_and_fail<T: 'static>(fs: &Fs, fd: Fd, err: FsError, cb: Callback<T>) {
    fs.close(fd, move |closed| {
        if let Err(e) = closed {
            warn!(fd = %fd, error = %e, "Ignoring close failure after earlier error");
        }
        cb(Err(err))
    });
}

/// Close after success; a close failure is the result
fn close_and_finish<T: 'static>(fs: &Fs, fd: Fd, value: T, cb: Callback<T>) {
    fs.close(fd, move |closed| cb(closed.map(|_| value)));
}

struct ReadWhole {
    fs: Fs,
    fd: Fd,
    cb: Callback<Vec<u8>>,
}

impl ReadWhole {
    fn step(self, buf: Vec<u8>, filled: usize) {
        if filled == buf.len() {
            return self.finish(buf);
        }
        let fs = self.fs.clone();
        let fd = self.fd;
        let len = buf.len() - filled;
        fs.read_window(fd, buf, filled, len, None, move |r| match r {
            Err(e) => self.fail(e),
            Ok((0, mut buf)) => {
                // Shorter than fstat said
                buf.truncate(filled);
                self.finish(buf)
            }
            Ok((n, buf)) => self.step(buf, filled + n),
        });
    }

    fn finish(self, buf: Vec<u8>) {
        close_and_finish(&self.fs, self.fd, buf, self.cb);
    }

    fn fail(self, err: FsError) {
        close_and_fail(&self.fs, self.fd, err, self.cb);
    }
}

struct WriteWhole {
    fs: Fs,
    fd: Fd,
    cb: Callback<()>,
}

impl WriteWhole {
    fn step(self, data: Bytes) {
        if data.is_empty() {
            return close_and_finish(&self.fs, self.fd, (), self.cb);
        }
        let fs = self.fs.clone();
        let fd = self.fd;
        fs.write(fd, data.clone(), None, move |r| match r {
            Err(e) => close_and_fail(&self.fs, self.fd, e, self.cb),
            Ok(0) => {
                let err = self.fs.no_progress_error();
                close_and_fail(&self.fs, self.fd, err, self.cb)
            }
            Ok(n) => self.step(data.slice(n.min(data.len())..)),
        });
    }
}

impl Fs {
    /// EIO for a write that accepted nothing while data remained
    pub(crate) fn no_progress_error(&self) -> FsError {
        self.errnos().error(-(Errno::EIO as i32))
    }

    /// Whole contents of `path`
    pub fn read_file(&self, path: impl AsRef<Path>, cb: impl FnOnce(FsResult<Vec<u8>>) + 'static) {
        let fs = self.clone();
        self.open(path, OpenFlags::READ, DEFAULT_FILE_MODE, move |r| {
            let fd = match r {
                Ok(fd) => fd,
                Err(e) => return cb(Err(e)),
            };
            let job = ReadWhole {
                fs: fs.clone(),
                fd,
                cb: Box::new(cb),
            };
            fs.fstat(fd, move |st| match st {
                Err(e) => job.fail(e),
                Ok(st) => job.step(vec![0; st.size as usize], 0),
            });
        });
    }

    /// Replace the contents of `path`, creating it if needed
    pub fn write_file(
        &self,
        path: impl AsRef<Path>,
        data: impl Into<Bytes>,
        cb: impl FnOnce(FsResult<()>) + 'static,
    ) {
        self.write_whole(path.as_ref(), data.into(), write_flags(), DEFAULT_FILE_MODE, Box::new(cb));
    }

    /// Append to `path`, creating it if needed
    pub fn append_file(
        &self,
        path: impl AsRef<Path>,
        data: impl Into<Bytes>,
        cb: impl FnOnce(FsResult<()>) + 'static,
    ) {
        self.write_whole(path.as_ref(), data.into(), append_flags(), DEFAULT_FILE_MODE, Box::new(cb));
    }

    /// Whole-file write with explicit open flags and mode
    pub fn write_file_with(
        &self,
        path: impl AsRef<Path>,
        data: impl Into<Bytes>,
        flags: OpenFlags,
        mode: u32,
        cb: impl FnOnce(FsResult<()>) + 'static,
    ) {
        self.write_whole(path.as_ref(), data.into(), flags, mode, Box::new(cb));
    }

    fn write_whole(&self, path: &Path, data: Bytes, flags: OpenFlags, mode: u32, cb: Callback<()>) {
        let fs = self.clone();
        self.open(path, flags, mode, move |r| match r {
            Err(e) => cb(Err(e)),
            Ok(fd) => WriteWhole { fs, fd, cb }.step(data),
        });
    }

    pub fn read_file_sync(&self, path: impl AsRef<Path>) -> FsResult<Vec<u8>> {
        let fd = self.open_sync(path, OpenFlags::READ, DEFAULT_FILE_MODE)?;
        let result = self.read_open_file_sync(fd);
        self.finish_sync(fd, result)
    }

    pub fn write_file_sync(&self, path: impl AsRef<Path>, data: impl Into<Bytes>) -> FsResult<()> {
        self.write_file_with_sync(path, data, write_flags(), DEFAULT_FILE_MODE)
    }

    pub fn append_file_sync(&self, path: impl AsRef<Path>, data: impl Into<Bytes>) -> FsResult<()> {
        self.write_file_with_sync(path, data, append_flags(), DEFAULT_FILE_MODE)
    }

    pub fn write_file_with_sync(
        &self,
        path: impl AsRef<Path>,
        data: impl Into<Bytes>,
        flags: OpenFlags,
        mode: u32,
    ) -> FsResult<()> {
        let fd = self.open_sync(path, flags, mode)?;
        let mut data: Bytes = data.into();
        let mut result = Ok(());
        while !data.is_empty() {
            match self.write_sync(fd, data.clone(), None) {
                Ok(0) => {
                    result = Err(self.no_progress_error());
                    break;
                }
                Ok(n) => data = data.slice(n.min(data.len())..),
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        self.finish_sync(fd, result)
    }

    fn read_open_file_sync(&self, fd: Fd) -> FsResult<Vec<u8>> {
        let size = self.fstat_sync(fd)?.size as usize;
        let mut buf = vec![0; size];
        let mut filled = 0;
        while filled < buf.len() {
            let len = buf.len() - filled;
            let n = self.read_sync(fd, &mut buf, filled, len, None)?;
            if n == 0 {
                buf.truncate(filled);
                break;
            }
            filled += n;
        }
        Ok(buf)
    }

    /// Close `fd`, surfacing a close error only when `result` succeeded
    fn finish_sync<T>(&self, fd: Fd, result: FsResult<T>) -> FsResult<T> {
        let closed = self.close_sync(fd);
        match result {
            Ok(value) => closed.map(|_| value),
            Err(e) => {
                if let Err(close_err) = closed {
                    warn!(fd = %fd, error = %close_err, "Ignoring close failure after earlier error");
                }
                Err(e)
            }
        }
    }
}
