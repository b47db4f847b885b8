/*!
 * slotfs
 *
 * POSIX-style filesystem API over an asynchronous native I/O layer. Every
 * in-flight operation occupies a slot in a reusable pool; a single
 * dispatcher routes native completions back to the continuation that
 * issued them.
 */

pub mod core;
pub mod decode;
pub mod fs;
pub mod monitoring;
pub mod native;
pub mod requests;
pub mod stream;

// Re-exports
pub use crate::core::{DirHandle, ErrnoTable, Fd, FsConfig, FsError, FsResult, Position};
pub use decode::{Dirent, DirentType, Stats};
pub use fs::{
    parse_mode, CpOptions, Dir, Fs, FsBuilder, MkdirOptions, OpenFlags, Pending, Promises,
    RmOptions, F_OK, R_OK, W_OK, X_OK,
};
pub use monitoring::init_tracing;
pub use native::{ManualBackend, NativeBackend, ThreadPoolBackend};
pub use stream::{ReadStream, ReadStreamOptions, StreamState, WriteStream, WriteStreamOptions};
