/*!
 * Asynchronous Primitives
 *
 * One native request per call. Arguments are checked before a slot is
 * acquired; anything wrong there is returned directly and the callback
 * is never invoked. Everything else is delivered to the callback exactly
 * once, from the loop thread.
 */

use super::flags::OpenFlags;
use super::tree::MkdirOptions;
use super::{missing_output, Fs};
use crate::core::{ArgErrorCode, Fd, FsError, FsResult, Position};
use crate::decode::{decode_path, new_path_block, Stats};
use crate::native::NativeOp;
use crate::requests::{Completed, Continuation, Outputs};
use bytes::Bytes;
use std::path::{Path, PathBuf};

/// Boxed caller callback, for composite operations that recurse
pub(crate) type Callback<T> = Box<dyn FnOnce(FsResult<T>)>;

/// Continuation that only cares whether the operation succeeded
pub(super) fn unit(cb: impl FnOnce(FsResult<()>) + 'static) -> Continuation {
    Box::new(move |r: FsResult<Completed>| cb(r.map(|_| ())))
}

/// Same as `unit`, tagging operation errors with `path`
pub(super) fn unit_at(path: PathBuf, cb: impl FnOnce(FsResult<()>) + 'static) -> Continuation {
    Box::new(move |r: FsResult<Completed>| cb(r.map(|_| ()).map_err(|e| e.with_path(path))))
}

pub(super) fn stats_from(r: FsResult<Completed>) -> FsResult<Stats> {
    let done = r?;
    done.outputs
        .and_then(Outputs::into_stat)
        .map(|raw| Stats::decode(&raw))
        .ok_or_else(|| missing_output("stat"))
}

fn path_from(r: FsResult<Completed>, op: &str) -> FsResult<PathBuf> {
    let done = r?;
    done.outputs
        .and_then(Outputs::into_buffer)
        .map(|block| decode_path(&block))
        .ok_or_else(|| missing_output(op))
}

/// Check that `[offset, offset + len)` lies inside a buffer of `size` bytes
pub(super) fn check_window(size: usize, offset: usize, len: usize) -> FsResult<()> {
    if offset > size {
        return Err(FsError::invalid_arg(
            ArgErrorCode::OutOfRange,
            format!(
                "The value of \"offset\" is out of range. It must be <= {}. Received {}",
                size, offset
            ),
        ));
    }
    if len > size - offset {
        return Err(FsError::invalid_arg(
            ArgErrorCode::OutOfRange,
            format!(
                "The value of \"length\" is out of range. It must be <= {}. Received {}",
                size - offset,
                len
            ),
        ));
    }
    Ok(())
}

pub(super) fn new_stat_block() -> Outputs {
    Outputs::Stat(Box::new([0; crate::core::limits::STAT_BLOCK_SIZE]))
}

impl Fs {
    /// Open `path`, delivering the new descriptor
    pub fn open(
        &self,
        path: impl AsRef<Path>,
        flags: OpenFlags,
        mode: u32,
        cb: impl FnOnce(FsResult<Fd>) + 'static,
    ) {
        let path = path.as_ref().to_path_buf();
        let op = NativeOp::Open {
            path: path.clone(),
            flags: flags.bits(),
            mode,
        };
        self.submit(
            op,
            None,
            Box::new(move |r| {
                cb(r
                    .map(|done| Fd::from_raw(done.result as i32))
                    .map_err(|e| e.with_path(path)))
            }),
        );
    }

    pub fn close(&self, fd: Fd, cb: impl FnOnce(FsResult<()>) + 'static) {
        self.submit(NativeOp::Close { fd }, None, unit(cb));
    }

    /// Read up to `len` bytes into `buf[offset..]`
    ///
    /// The buffer travels with the request and comes back with the byte
    /// count. `position: None` reads at the descriptor's current offset.
    pub fn read(
        &self,
        fd: Fd,
        buf: Vec<u8>,
        offset: usize,
        len: usize,
        position: Position,
        cb: impl FnOnce(FsResult<(usize, Vec<u8>)>) + 'static,
    ) -> FsResult<()> {
        check_window(buf.len(), offset, len)?;
        self.read_window(fd, buf, offset, len, position, cb);
        Ok(())
    }

    /// `read` for callers that already guarantee a valid window
    pub(crate) fn read_window(
        &self,
        fd: Fd,
        buf: Vec<u8>,
        offset: usize,
        len: usize,
        position: Position,
        cb: impl FnOnce(FsResult<(usize, Vec<u8>)>) + 'static,
    ) {
        let op = NativeOp::Read {
            fd,
            offset,
            len,
            position,
        };
        self.submit(
            op,
            Some(Outputs::Buffer(buf)),
            Box::new(move |r| {
                cb(r.and_then(|done| {
                    let buf = done
                        .outputs
                        .and_then(Outputs::into_buffer)
                        .ok_or_else(|| missing_output("read"))?;
                    Ok((done.result as usize, buf))
                }))
            }),
        );
    }

    /// Scatter read into `bufs`, filling each in order
    pub fn readv(
        &self,
        fd: Fd,
        bufs: Vec<Vec<u8>>,
        position: Position,
        cb: impl FnOnce(FsResult<(usize, Vec<Vec<u8>>)>) + 'static,
    ) {
        self.submit(
            NativeOp::Readv { fd, position },
            Some(Outputs::Buffers(bufs)),
            Box::new(move |r| {
                cb(r.and_then(|done| {
                    let bufs = done
                        .outputs
                        .and_then(Outputs::into_buffers)
                        .ok_or_else(|| missing_output("readv"))?;
                    Ok((done.result as usize, bufs))
                }))
            }),
        );
    }

    /// Write `data`, delivering the number of bytes written
    ///
    /// A short write is not retried here.
    pub fn write(
        &self,
        fd: Fd,
        data: impl Into<Bytes>,
        position: Position,
        cb: impl FnOnce(FsResult<usize>) + 'static,
    ) {
        self.submit(
            NativeOp::Write { fd, position },
            Some(Outputs::Source(data.into())),
            Box::new(move |r| cb(r.map(|done| done.result as usize))),
        );
    }

    /// Gather write of `data` in order
    pub fn writev(
        &self,
        fd: Fd,
        data: Vec<Bytes>,
        position: Position,
        cb: impl FnOnce(FsResult<usize>) + 'static,
    ) {
        self.submit(
            NativeOp::Writev { fd, position },
            Some(Outputs::Sources(data)),
            Box::new(move |r| cb(r.map(|done| done.result as usize))),
        );
    }

    pub fn ftruncate(&self, fd: Fd, len: u64, cb: impl FnOnce(FsResult<()>) + 'static) {
        self.submit(NativeOp::Ftruncate { fd, len }, None, unit(cb));
    }

    pub fn fchmod(&self, fd: Fd, mode: u32, cb: impl FnOnce(FsResult<()>) + 'static) {
        self.submit(NativeOp::Fchmod { fd, mode }, None, unit(cb));
    }

    pub fn chmod(&self, path: impl AsRef<Path>, mode: u32, cb: impl FnOnce(FsResult<()>) + 'static) {
        let path = path.as_ref().to_path_buf();
        self.submit(
            NativeOp::Chmod {
                path: path.clone(),
                mode,
            },
            None,
            unit_at(path, cb),
        );
    }

    /// Status of `path`, following symlinks
    pub fn stat(&self, path: impl AsRef<Path>, cb: impl FnOnce(FsResult<Stats>) + 'static) {
        let path = path.as_ref().to_path_buf();
        self.submit(
            NativeOp::Stat { path: path.clone() },
            Some(new_stat_block()),
            Box::new(move |r| cb(stats_from(r).map_err(|e| e.with_path(path)))),
        );
    }

    /// Status of `path` itself, not its symlink target
    pub fn lstat(&self, path: impl AsRef<Path>, cb: impl FnOnce(FsResult<Stats>) + 'static) {
        let path = path.as_ref().to_path_buf();
        self.submit(
            NativeOp::Lstat { path: path.clone() },
            Some(new_stat_block()),
            Box::new(move |r| cb(stats_from(r).map_err(|e| e.with_path(path)))),
        );
    }

    pub fn fstat(&self, fd: Fd, cb: impl FnOnce(FsResult<Stats>) + 'static) {
        self.submit(
            NativeOp::Fstat { fd },
            Some(new_stat_block()),
            Box::new(move |r| cb(stats_from(r))),
        );
    }

    /// Create a directory; with `recursive`, missing ancestors too
    pub fn mkdir(
        &self,
        path: impl AsRef<Path>,
        options: MkdirOptions,
        cb: impl FnOnce(FsResult<()>) + 'static,
    ) {
        let path = path.as_ref().to_path_buf();
        if options.recursive {
            return self.mkdirp(path, options.mode, cb);
        }
        self.submit(
            NativeOp::Mkdir {
                path: path.clone(),
                mode: options.mode,
            },
            None,
            unit_at(path, cb),
        );
    }

    pub fn rmdir(&self, path: impl AsRef<Path>, cb: impl FnOnce(FsResult<()>) + 'static) {
        let path = path.as_ref().to_path_buf();
        self.submit(NativeOp::Rmdir { path: path.clone() }, None, unit_at(path, cb));
    }

    pub fn unlink(&self, path: impl AsRef<Path>, cb: impl FnOnce(FsResult<()>) + 'static) {
        let path = path.as_ref().to_path_buf();
        self.submit(NativeOp::Unlink { path: path.clone() }, None, unit_at(path, cb));
    }

    pub fn rename(
        &self,
        from: impl AsRef<Path>,
        to: impl AsRef<Path>,
        cb: impl FnOnce(FsResult<()>) + 'static,
    ) {
        let from = from.as_ref().to_path_buf();
        let op = NativeOp::Rename {
            from: from.clone(),
            to: to.as_ref().to_path_buf(),
        };
        self.submit(op, None, unit_at(from, cb));
    }

    /// Create `path` as a symlink pointing at `target`
    pub fn symlink(
        &self,
        target: impl AsRef<Path>,
        path: impl AsRef<Path>,
        cb: impl FnOnce(FsResult<()>) + 'static,
    ) {
        let path = path.as_ref().to_path_buf();
        let op = NativeOp::Symlink {
            target: target.as_ref().to_path_buf(),
            path: path.clone(),
        };
        self.submit(op, None, unit_at(path, cb));
    }

    /// Target of a symlink, exactly as stored (not resolved)
    pub fn readlink(&self, path: impl AsRef<Path>, cb: impl FnOnce(FsResult<PathBuf>) + 'static) {
        let path = path.as_ref().to_path_buf();
        self.submit(
            NativeOp::Readlink { path: path.clone() },
            Some(Outputs::Path(new_path_block())),
            Box::new(move |r| cb(path_from(r, "readlink").map_err(|e| e.with_path(path)))),
        );
    }

    /// Canonical absolute path with every symlink resolved
    pub fn realpath(&self, path: impl AsRef<Path>, cb: impl FnOnce(FsResult<PathBuf>) + 'static) {
        let path = path.as_ref().to_path_buf();
        self.submit(
            NativeOp::Realpath { path: path.clone() },
            Some(Outputs::Path(new_path_block())),
            Box::new(move |r| cb(path_from(r, "realpath").map_err(|e| e.with_path(path)))),
        );
    }

    /// Copy one file; `COPYFILE_EXCL` in `flags` refuses to overwrite
    pub fn copy_file(
        &self,
        src: impl AsRef<Path>,
        dst: impl AsRef<Path>,
        flags: u32,
        cb: impl FnOnce(FsResult<()>) + 'static,
    ) {
        let src = src.as_ref().to_path_buf();
        let op = NativeOp::CopyFile {
            src: src.clone(),
            dst: dst.as_ref().to_path_buf(),
            flags,
        };
        self.submit(op, None, unit_at(src, cb));
    }

    /// Check accessibility with `F_OK`, `R_OK`, `W_OK`, `X_OK`
    pub fn access(&self, path: impl AsRef<Path>, mode: i32, cb: impl FnOnce(FsResult<()>) + 'static) {
        let path = path.as_ref().to_path_buf();
        self.submit(
            NativeOp::Access {
                path: path.clone(),
                mode,
            },
            None,
            unit_at(path, cb),
        );
    }

    /// Whether `path` exists; every failure reads as `false`
    pub fn exists(&self, path: impl AsRef<Path>, cb: impl FnOnce(bool) + 'static) {
        self.access(path, super::F_OK, move |r| cb(r.is_ok()));
    }
}
