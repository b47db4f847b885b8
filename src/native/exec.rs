/*!
 * Native Executor
 *
 * Performs one `NativeOp` with blocking syscalls and reports the result
 * with the native sign convention: negative errno on failure, a
 * non-negative value (bytes, descriptor, count, handle) on success.
 * Raw stat, dirent and path blocks are written in host byte order through
 * the encoders in `decode`.
 */

use super::op::NativeOp;
use crate::core::limits::{COPYFILE_EXCL, DIRENT_RECORD_SIZE};
use crate::core::{DirHandle, Fd};
use crate::decode::{encode_dirent, encode_path, ByteOrder, DirentType, Stats};
use crate::requests::Outputs;
use ahash::RandomState;
use dashmap::DashMap;
use nix::errno::Errno;
use nix::fcntl::{self, OFlag};
use nix::sys::stat::{mode_t, Mode};
use nix::unistd::{self, AccessFlags};
use std::ffi::OsString;
use std::fs::{self, File, FileType, Metadata, Permissions, ReadDir};
use std::io::{self, IoSlice, IoSliceMut, Read, Write};
use std::mem::ManuallyDrop;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{DirBuilderExt, FileExt, FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::io::FromRawFd;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::UNIX_EPOCH;
use tracing::trace;

type NativeResult = Result<i64, Errno>;

/// An open directory stream
#[derive(Debug)]
struct OpenDir {
    entries: ReadDir,
    /// Error hit after part of a batch was already filled
    deferred: Option<Errno>,
}

/// Blocking syscall executor shared by the native backends
#[derive(Debug)]
pub struct Executor {
    dirs: DashMap<u64, OpenDir, RandomState>,
    next_dir: AtomicU64,
}

impl Executor {
    pub fn new() -> Self {
        Self {
            dirs: DashMap::with_hasher(RandomState::new()),
            next_dir: AtomicU64::new(1),
        }
    }

    /// Run `op`, reading from or filling the retained `outputs`
    pub fn execute(&self, op: &NativeOp, outputs: &mut Option<Outputs>) -> i64 {
        match self.run(op, outputs) {
            Ok(result) => result,
            Err(errno) => {
                trace!(op = %op.kind(), errno = ?errno, "Native operation failed");
                -(errno as i64)
            }
        }
    }

    /// Directory streams currently open
    pub fn open_dirs(&self) -> usize {
        self.dirs.len()
    }

    fn run(&self, op: &NativeOp, outputs: &mut Option<Outputs>) -> NativeResult {
        match op {
            NativeOp::Open { path, flags, mode } => {
                let flags = OFlag::from_bits_truncate(*flags) | OFlag::O_CLOEXEC;
                let fd = fcntl::open(path.as_path(), flags, Mode::from_bits_truncate(*mode as mode_t))?;
                Ok(fd as i64)
            }
            NativeOp::Close { fd } => {
                unistd::close(fd.as_raw())?;
                Ok(0)
            }
            NativeOp::Read {
                fd,
                offset,
                len,
                position,
            } => {
                let Some(Outputs::Buffer(buf)) = outputs else {
                    return Err(Errno::EINVAL);
                };
                let end = offset
                    .checked_add(*len)
                    .filter(|&end| end <= buf.len())
                    .ok_or(Errno::EINVAL)?;
                let file = borrow(*fd);
                let dst = &mut buf[*offset..end];
                let n = match position {
                    Some(pos) => file.read_at(dst, *pos),
                    None => (&*file).read(dst),
                }
                .map_err(errno_of)?;
                Ok(n as i64)
            }
            NativeOp::Readv { fd, position } => {
                let Some(Outputs::Buffers(bufs)) = outputs else {
                    return Err(Errno::EINVAL);
                };
                let file = borrow(*fd);
                match position {
                    None => {
                        let mut slices: Vec<IoSliceMut<'_>> = bufs
                            .iter_mut()
                            .map(|b| IoSliceMut::new(b.as_mut_slice()))
                            .collect();
                        let n = (&*file).read_vectored(&mut slices).map_err(errno_of)?;
                        Ok(n as i64)
                    }
                    Some(pos) => {
                        let mut total = 0u64;
                        for buf in bufs.iter_mut() {
                            let n = file.read_at(buf, pos + total).map_err(errno_of)?;
                            total += n as u64;
                            if n < buf.len() {
                                break;
                            }
                        }
                        Ok(total as i64)
                    }
                }
            }
            NativeOp::Write { fd, position } => {
                let Some(Outputs::Source(src)) = outputs else {
                    return Err(Errno::EINVAL);
                };
                let file = borrow(*fd);
                let n = match position {
                    Some(pos) => file.write_at(&src[..], *pos),
                    None => (&*file).write(&src[..]),
                }
                .map_err(errno_of)?;
                Ok(n as i64)
            }
            NativeOp::Writev { fd, position } => {
                let Some(Outputs::Sources(srcs)) = outputs else {
                    return Err(Errno::EINVAL);
                };
                let file = borrow(*fd);
                match position {
                    None => {
                        let slices: Vec<IoSlice<'_>> =
                            srcs.iter().map(|b| IoSlice::new(&b[..])).collect();
                        let n = (&*file).write_vectored(&slices).map_err(errno_of)?;
                        Ok(n as i64)
                    }
                    Some(pos) => {
                        let mut total = 0u64;
                        for src in srcs.iter() {
                            let n = file.write_at(&src[..], pos + total).map_err(errno_of)?;
                            total += n as u64;
                            if n < src.len() {
                                break;
                            }
                        }
                        Ok(total as i64)
                    }
                }
            }
            NativeOp::Ftruncate { fd, len } => {
                borrow(*fd).set_len(*len).map_err(errno_of)?;
                Ok(0)
            }
            NativeOp::Fchmod { fd, mode } => {
                borrow(*fd)
                    .set_permissions(Permissions::from_mode(*mode))
                    .map_err(errno_of)?;
                Ok(0)
            }
            NativeOp::Chmod { path, mode } => {
                fs::set_permissions(path, Permissions::from_mode(*mode)).map_err(errno_of)?;
                Ok(0)
            }
            NativeOp::Stat { path } => {
                let meta = fs::metadata(path).map_err(errno_of)?;
                fill_stat(outputs, &meta)
            }
            NativeOp::Lstat { path } => {
                let meta = fs::symlink_metadata(path).map_err(errno_of)?;
                fill_stat(outputs, &meta)
            }
            NativeOp::Fstat { fd } => {
                let meta = borrow(*fd).metadata().map_err(errno_of)?;
                fill_stat(outputs, &meta)
            }
            NativeOp::Mkdir { path, mode } => {
                fs::DirBuilder::new()
                    .mode(*mode)
                    .create(path)
                    .map_err(errno_of)?;
                Ok(0)
            }
            NativeOp::Rmdir { path } => {
                fs::remove_dir(path).map_err(errno_of)?;
                Ok(0)
            }
            NativeOp::Unlink { path } => {
                fs::remove_file(path).map_err(errno_of)?;
                Ok(0)
            }
            NativeOp::Rename { from, to } => {
                fs::rename(from, to).map_err(errno_of)?;
                Ok(0)
            }
            NativeOp::Symlink { target, path } => {
                std::os::unix::fs::symlink(target, path).map_err(errno_of)?;
                Ok(0)
            }
            NativeOp::Readlink { path } => {
                let target = fs::read_link(path).map_err(errno_of)?;
                fill_path(outputs, target.as_os_str().as_bytes())
            }
            NativeOp::Realpath { path } => {
                let resolved = fs::canonicalize(path).map_err(errno_of)?;
                fill_path(outputs, resolved.as_os_str().as_bytes())
            }
            NativeOp::CopyFile { src, dst, flags } => {
                if flags & COPYFILE_EXCL != 0 && fs::symlink_metadata(dst).is_ok() {
                    return Err(Errno::EEXIST);
                }
                fs::copy(src, dst).map_err(errno_of)?;
                Ok(0)
            }
            NativeOp::Access { path, mode } => {
                unistd::access(path.as_path(), AccessFlags::from_bits_truncate(*mode))?;
                Ok(0)
            }
            NativeOp::Opendir { path } => {
                let entries = fs::read_dir(path).map_err(errno_of)?;
                let handle = self.next_dir.fetch_add(1, Ordering::Relaxed);
                self.dirs.insert(
                    handle,
                    OpenDir {
                        entries,
                        deferred: None,
                    },
                );
                Ok(handle as i64)
            }
            NativeOp::Readdir { dir } => self.read_batch(*dir, outputs),
            NativeOp::Closedir { dir } => self
                .dirs
                .remove(&dir.as_raw())
                .map(|_| 0)
                .ok_or(Errno::EBADF),
        }
    }

    /// Fill as many dirent records as the retained block holds
    fn read_batch(&self, dir: DirHandle, outputs: &mut Option<Outputs>) -> NativeResult {
        let Some(Outputs::Dirents(block)) = outputs else {
            return Err(Errno::EINVAL);
        };
        let mut open = self.dirs.get_mut(&dir.as_raw()).ok_or(Errno::EBADF)?;
        let OpenDir { entries, deferred } = &mut *open;
        let named = entries.by_ref().map(|entry| -> Result<(DirentType, OsString), Errno> {
            let entry = entry.map_err(errno_of)?;
            let kind = entry
                .file_type()
                .map(dirent_type)
                .unwrap_or(DirentType::Unknown);
            Ok((kind, entry.file_name()))
        });
        fill_batch(named, deferred, block)
    }
}

/// Encode entries until `block` is full or the stream ends
///
/// An error after at least one entry was encoded is held in `deferred` and
/// reported by the next batch, so the entries already read are not lost.
fn fill_batch<I>(mut entries: I, deferred: &mut Option<Errno>, block: &mut [u8]) -> NativeResult
where
    I: Iterator<Item = Result<(DirentType, OsString), Errno>>,
{
    if let Some(errno) = deferred.take() {
        return Err(errno);
    }
    let capacity = block.len() / DIRENT_RECORD_SIZE;

    let mut count = 0;
    while count < capacity {
        match entries.next() {
            None => break,
            Some(Ok((kind, name))) => {
                encode_dirent(block, count, kind, name.as_bytes(), ByteOrder::native());
                count += 1;
            }
            Some(Err(errno)) if count > 0 => {
                *deferred = Some(errno);
                break;
            }
            Some(Err(errno)) => return Err(errno),
        }
    }

    Ok(count as i64)
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

/// View a descriptor as a `File` without taking ownership of it
fn borrow(fd: Fd) -> ManuallyDrop<File> {
    // SAFETY: the descriptor stays owned by the caller; ManuallyDrop keeps
    // the temporary File from closing it.
    ManuallyDrop::new(unsafe { File::from_raw_fd(fd.as_raw()) })
}

/// Map an I/O error to the errno the native layer reports
pub(crate) fn errno_of(err: io::Error) -> Errno {
    if let Some(code) = err.raw_os_error() {
        return Errno::from_raw(code);
    }
    match err.kind() {
        io::ErrorKind::NotFound => Errno::ENOENT,
        io::ErrorKind::PermissionDenied => Errno::EACCES,
        io::ErrorKind::AlreadyExists => Errno::EEXIST,
        io::ErrorKind::InvalidInput => Errno::EINVAL,
        io::ErrorKind::Unsupported => Errno::ENOTSUP,
        _ => Errno::EIO,
    }
}

fn fill_stat(outputs: &mut Option<Outputs>, meta: &Metadata) -> NativeResult {
    let Some(Outputs::Stat(raw)) = outputs else {
        return Err(Errno::EINVAL);
    };
    stats_of(meta).encode_into(raw, ByteOrder::native());
    Ok(0)
}

fn fill_path(outputs: &mut Option<Outputs>, path: &[u8]) -> NativeResult {
    let Some(Outputs::Path(block)) = outputs else {
        return Err(Errno::EINVAL);
    };
    if !encode_path(block, path) {
        return Err(Errno::ENAMETOOLONG);
    }
    Ok(path.len() as i64)
}

fn stats_of(meta: &Metadata) -> Stats {
    let ctime_ms = millis(meta.ctime(), meta.ctime_nsec());
    let birthtime_ms = meta
        .created()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(ctime_ms);

    Stats {
        dev: meta.dev(),
        mode: meta.mode() as u64,
        nlink: meta.nlink(),
        uid: meta.uid() as u64,
        gid: meta.gid() as u64,
        rdev: meta.rdev(),
        ino: meta.ino(),
        size: meta.size(),
        blksize: meta.blksize(),
        blocks: meta.blocks(),
        flags: 0,
        gen: 0,
        atime_ms: millis(meta.atime(), meta.atime_nsec()),
        mtime_ms: millis(meta.mtime(), meta.mtime_nsec()),
        ctime_ms,
        birthtime_ms,
    }
}

#[inline]
fn millis(secs: i64, nsec: i64) -> i64 {
    secs * 1000 + nsec / 1_000_000
}

fn dirent_type(ft: FileType) -> DirentType {
    if ft.is_file() {
        DirentType::File
    } else if ft.is_dir() {
        DirentType::Dir
    } else if ft.is_symlink() {
        DirentType::Symlink
    } else if ft.is_fifo() {
        DirentType::Fifo
    } else if ft.is_socket() {
        DirentType::Socket
    } else if ft.is_char_device() {
        DirentType::CharDevice
    } else if ft.is_block_device() {
        DirentType::BlockDevice
    } else {
        DirentType::Unknown
    }
}
