/*!
 * Synchronous Variants
 * Same operations, performed on the calling thread without the pool
 */

use super::flags::OpenFlags;
use super::ops::{check_window, new_stat_block};
use super::tree::MkdirOptions;
use super::{missing_output, Fs};
use crate::core::{Fd, FsResult, Position};
use crate::decode::{decode_path, new_path_block, Stats};
use crate::native::NativeOp;
use crate::requests::Outputs;
use bytes::Bytes;
use std::path::{Path, PathBuf};

impl Fs {
    pub fn open_sync(&self, path: impl AsRef<Path>, flags: OpenFlags, mode: u32) -> FsResult<Fd> {
        let path = path.as_ref();
        let op = NativeOp::Open {
            path: path.to_path_buf(),
            flags: flags.bits(),
            mode,
        };
        let fd = self
            .execute_sync(&op, &mut None)
            .map_err(|e| e.with_path(path))?;
        Ok(Fd::from_raw(fd as i32))
    }

    pub fn close_sync(&self, fd: Fd) -> FsResult<()> {
        self.execute_sync(&NativeOp::Close { fd }, &mut None)?;
        Ok(())
    }

    /// Read up to `len` bytes into `buf[offset..]`, returning the count
    pub fn read_sync(
        &self,
        fd: Fd,
        buf: &mut Vec<u8>,
        offset: usize,
        len: usize,
        position: Position,
    ) -> FsResult<usize> {
        check_window(buf.len(), offset, len)?;
        let op = NativeOp::Read {
            fd,
            offset,
            len,
            position,
        };
        let mut outputs = Some(Outputs::Buffer(std::mem::take(buf)));
        let result = self.execute_sync(&op, &mut outputs);
        if let Some(back) = outputs.and_then(Outputs::into_buffer) {
            *buf = back;
        }
        Ok(result? as usize)
    }

    pub fn write_sync(&self, fd: Fd, data: impl Into<Bytes>, position: Position) -> FsResult<usize> {
        let mut outputs = Some(Outputs::Source(data.into()));
        let n = self.execute_sync(&NativeOp::Write { fd, position }, &mut outputs)?;
        Ok(n as usize)
    }

    pub fn writev_sync(&self, fd: Fd, data: Vec<Bytes>, position: Position) -> FsResult<usize> {
        let mut outputs = Some(Outputs::Sources(data));
        let n = self.execute_sync(&NativeOp::Writev { fd, position }, &mut outputs)?;
        Ok(n as usize)
    }

    pub fn ftruncate_sync(&self, fd: Fd, len: u64) -> FsResult<()> {
        self.execute_sync(&NativeOp::Ftruncate { fd, len }, &mut None)?;
        Ok(())
    }

    pub fn chmod_sync(&self, path: impl AsRef<Path>, mode: u32) -> FsResult<()> {
        let path = path.as_ref();
        let op = NativeOp::Chmod {
            path: path.to_path_buf(),
            mode,
        };
        self.path_op(&op, path)
    }

    pub fn fstat_sync(&self, fd: Fd) -> FsResult<Stats> {
        self.stat_op(&NativeOp::Fstat { fd })
    }

    pub fn stat_sync(&self, path: impl AsRef<Path>) -> FsResult<Stats> {
        let path = path.as_ref();
        self.stat_op(&NativeOp::Stat {
            path: path.to_path_buf(),
        })
        .map_err(|e| e.with_path(path))
    }

    pub fn lstat_sync(&self, path: impl AsRef<Path>) -> FsResult<Stats> {
        let path = path.as_ref();
        self.stat_op(&NativeOp::Lstat {
            path: path.to_path_buf(),
        })
        .map_err(|e| e.with_path(path))
    }

    pub fn mkdir_sync(&self, path: impl AsRef<Path>, options: MkdirOptions) -> FsResult<()> {
        let path = path.as_ref();
        if options.recursive {
            return self.mkdirp_sync(path, options.mode);
        }
        let op = NativeOp::Mkdir {
            path: path.to_path_buf(),
            mode: options.mode,
        };
        self.path_op(&op, path)
    }

    pub fn rmdir_sync(&self, path: impl AsRef<Path>) -> FsResult<()> {
        let path = path.as_ref();
        self.path_op(
            &NativeOp::Rmdir {
                path: path.to_path_buf(),
            },
            path,
        )
    }

    pub fn unlink_sync(&self, path: impl AsRef<Path>) -> FsResult<()> {
        let path = path.as_ref();
        self.path_op(
            &NativeOp::Unlink {
                path: path.to_path_buf(),
            },
            path,
        )
    }

    pub fn rename_sync(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> FsResult<()> {
        let from = from.as_ref();
        let op = NativeOp::Rename {
            from: from.to_path_buf(),
            to: to.as_ref().to_path_buf(),
        };
        self.path_op(&op, from)
    }

    pub fn symlink_sync(&self, target: impl AsRef<Path>, path: impl AsRef<Path>) -> FsResult<()> {
        let path = path.as_ref();
        let op = NativeOp::Symlink {
            target: target.as_ref().to_path_buf(),
            path: path.to_path_buf(),
        };
        self.path_op(&op, path)
    }

    pub fn readlink_sync(&self, path: impl AsRef<Path>) -> FsResult<PathBuf> {
        let path = path.as_ref();
        self.path_block_op(
            &NativeOp::Readlink {
                path: path.to_path_buf(),
            },
            "readlink",
        )
        .map_err(|e| e.with_path(path))
    }

    pub fn realpath_sync(&self, path: impl AsRef<Path>) -> FsResult<PathBuf> {
        let path = path.as_ref();
        self.path_block_op(
            &NativeOp::Realpath {
                path: path.to_path_buf(),
            },
            "realpath",
        )
        .map_err(|e| e.with_path(path))
    }

    pub fn copy_file_sync(&self, src: impl AsRef<Path>, dst: impl AsRef<Path>, flags: u32) -> FsResult<()> {
        let src = src.as_ref();
        let op = NativeOp::CopyFile {
            src: src.to_path_buf(),
            dst: dst.as_ref().to_path_buf(),
            flags,
        };
        self.path_op(&op, src)
    }

    pub fn access_sync(&self, path: impl AsRef<Path>, mode: i32) -> FsResult<()> {
        let path = path.as_ref();
        let op = NativeOp::Access {
            path: path.to_path_buf(),
            mode,
        };
        self.path_op(&op, path)
    }

    pub fn exists_sync(&self, path: impl AsRef<Path>) -> bool {
        self.access_sync(path, super::F_OK).is_ok()
    }

    fn path_op(&self, op: &NativeOp, path: &Path) -> FsResult<()> {
        self.execute_sync(op, &mut None)
            .map_err(|e| e.with_path(path))?;
        Ok(())
    }

    fn stat_op(&self, op: &NativeOp) -> FsResult<Stats> {
        let mut outputs = Some(new_stat_block());
        self.execute_sync(op, &mut outputs)?;
        outputs
            .and_then(Outputs::into_stat)
            .map(|raw| Stats::decode(&raw))
            .ok_or_else(|| missing_output("stat"))
    }

    fn path_block_op(&self, op: &NativeOp, name: &str) -> FsResult<PathBuf> {
        let mut outputs = Some(Outputs::Path(new_path_block()));
        self.execute_sync(op, &mut outputs)?;
        outputs
            .and_then(Outputs::into_buffer)
            .map(|block| decode_path(&block))
            .ok_or_else(|| missing_output(name))
    }
}
