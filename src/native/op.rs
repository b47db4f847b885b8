/*!
 * Native Operations
 * Everything the native layer can be asked to do
 */

use crate::core::{DirHandle, Fd, Position};
use std::fmt;
use std::path::PathBuf;

/// One request handed to the native layer
///
/// Buffers are not part of the op: reads, writes, stats and directory
/// batches move their data through the slot's retained [`Outputs`].
///
/// [`Outputs`]: crate::requests::Outputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeOp {
    /// Open `path`; result is the new descriptor
    Open { path: PathBuf, flags: i32, mode: u32 },
    Close { fd: Fd },
    /// Read `len` bytes into the retained buffer starting at `offset`
    Read {
        fd: Fd,
        offset: usize,
        len: usize,
        position: Position,
    },
    /// Fill the retained buffers in order
    Readv { fd: Fd, position: Position },
    /// Write the retained source
    Write { fd: Fd, position: Position },
    /// Write the retained sources in order
    Writev { fd: Fd, position: Position },
    Ftruncate { fd: Fd, len: u64 },
    Fchmod { fd: Fd, mode: u32 },
    Chmod { path: PathBuf, mode: u32 },
    /// Fill the retained raw stat block
    Stat { path: PathBuf },
    Lstat { path: PathBuf },
    Fstat { fd: Fd },
    Mkdir { path: PathBuf, mode: u32 },
    Rmdir { path: PathBuf },
    Unlink { path: PathBuf },
    Rename { from: PathBuf, to: PathBuf },
    /// Create `path` pointing at `target`
    Symlink { target: PathBuf, path: PathBuf },
    /// Fill the retained path block; result is the path length
    Readlink { path: PathBuf },
    Realpath { path: PathBuf },
    CopyFile { src: PathBuf, dst: PathBuf, flags: u32 },
    Access { path: PathBuf, mode: i32 },
    /// Open a directory stream; result is the handle
    Opendir { path: PathBuf },
    /// Fill the retained dirent block; result is the entry count, 0 at the end
    Readdir { dir: DirHandle },
    Closedir { dir: DirHandle },
}

impl NativeOp {
    pub fn kind(&self) -> OpKind {
        match self {
            NativeOp::Open { .. } => OpKind::Open,
            NativeOp::Close { .. } => OpKind::Close,
            NativeOp::Read { .. } => OpKind::Read,
            NativeOp::Readv { .. } => OpKind::Readv,
            NativeOp::Write { .. } => OpKind::Write,
            NativeOp::Writev { .. } => OpKind::Writev,
            NativeOp::Ftruncate { .. } => OpKind::Ftruncate,
            NativeOp::Fchmod { .. } => OpKind::Fchmod,
            NativeOp::Chmod { .. } => OpKind::Chmod,
            NativeOp::Stat { .. } => OpKind::Stat,
            NativeOp::Lstat { .. } => OpKind::Lstat,
            NativeOp::Fstat { .. } => OpKind::Fstat,
            NativeOp::Mkdir { .. } => OpKind::Mkdir,
            NativeOp::Rmdir { .. } => OpKind::Rmdir,
            NativeOp::Unlink { .. } => OpKind::Unlink,
            NativeOp::Rename { .. } => OpKind::Rename,
            NativeOp::Symlink { .. } => OpKind::Symlink,
            NativeOp::Readlink { .. } => OpKind::Readlink,
            NativeOp::Realpath { .. } => OpKind::Realpath,
            NativeOp::CopyFile { .. } => OpKind::CopyFile,
            NativeOp::Access { .. } => OpKind::Access,
            NativeOp::Opendir { .. } => OpKind::Opendir,
            NativeOp::Readdir { .. } => OpKind::Readdir,
            NativeOp::Closedir { .. } => OpKind::Closedir,
        }
    }
}

/// Discriminant of a [`NativeOp`], kept by slots for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Open,
    Close,
    Read,
    Readv,
    Write,
    Writev,
    Ftruncate,
    Fchmod,
    Chmod,
    Stat,
    Lstat,
    Fstat,
    Mkdir,
    Rmdir,
    Unlink,
    Rename,
    Symlink,
    Readlink,
    Realpath,
    CopyFile,
    Access,
    Opendir,
    Readdir,
    Closedir,
}

impl OpKind {
    pub const fn name(self) -> &'static str {
        match self {
            OpKind::Open => "open",
            OpKind::Close => "close",
            OpKind::Read => "read",
            OpKind::Readv => "readv",
            OpKind::Write => "write",
            OpKind::Writev => "writev",
            OpKind::Ftruncate => "ftruncate",
            OpKind::Fchmod => "fchmod",
            OpKind::Chmod => "chmod",
            OpKind::Stat => "stat",
            OpKind::Lstat => "lstat",
            OpKind::Fstat => "fstat",
            OpKind::Mkdir => "mkdir",
            OpKind::Rmdir => "rmdir",
            OpKind::Unlink => "unlink",
            OpKind::Rename => "rename",
            OpKind::Symlink => "symlink",
            OpKind::Readlink => "readlink",
            OpKind::Realpath => "realpath",
            OpKind::CopyFile => "copyfile",
            OpKind::Access => "access",
            OpKind::Opendir => "opendir",
            OpKind::Readdir => "readdir",
            OpKind::Closedir => "closedir",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}
