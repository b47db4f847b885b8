/*!
 * Limits and Constants
 *
 * Centralized location for buffer sizes, raw layout sizes and defaults.
 * Organized by domain for maintainability and discoverability.
 *
 * - Performance-relevant constants are marked with [PERF]
 * - Values that must agree with the native layer's raw layouts are marked with [LAYOUT]
 */

use std::time::Duration;

// =============================================================================
// REQUEST POOL
// =============================================================================

/// Slots reserved up front when an `Fs` instance is created.
/// The pool grows on demand, so zero is a valid choice.
pub const DEFAULT_INITIAL_SLOTS: usize = 16;

/// Operations slower than this are reported with `warn!`
pub const SLOW_OP_THRESHOLD: Duration = Duration::from_millis(10);

// =============================================================================
// NATIVE LAYER
// =============================================================================

/// Worker threads in the blocking pool of the thread-pool backend
/// [PERF] Matches libuv's default thread-pool size
pub const DEFAULT_WORKER_THREADS: usize = 4;

/// Longest path the native layer will hand back (readlink, realpath)
/// [LAYOUT]
pub const PATH_MAX: usize = 4096;

/// Raw path block size: path plus NUL terminator
/// [LAYOUT]
pub const PATH_BLOCK_SIZE: usize = PATH_MAX + 1;

// =============================================================================
// RAW STAT / DIRENT LAYOUTS
// =============================================================================

/// 32-bit words in a raw stat block (16 logical 64-bit fields)
/// [LAYOUT]
pub const STAT_WORDS: usize = 32;

/// Raw stat block size in bytes
/// [LAYOUT]
pub const STAT_BLOCK_SIZE: usize = STAT_WORDS * 4;

/// Longest directory entry name stored in a raw dirent record
/// [LAYOUT]
pub const DIRENT_NAME_MAX: usize = 256;

/// Raw dirent record: type (u32) + name length (u32) + name bytes
/// [LAYOUT]
pub const DIRENT_RECORD_SIZE: usize = 8 + DIRENT_NAME_MAX;

/// Directory entries fetched per native readdir round trip
/// [PERF] Amortizes the round trip without holding large blocks
pub const DEFAULT_READDIR_BATCH: usize = 32;

// =============================================================================
// STREAMS AND WHOLE-FILE OPERATIONS
// =============================================================================

/// Ceiling on a single read issued by a read stream (64KB)
/// [PERF]
pub const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Mode for newly created files before umask
pub const DEFAULT_FILE_MODE: u32 = 0o666;

/// Mode for newly created directories before umask
pub const DEFAULT_DIR_MODE: u32 = 0o777;

/// Largest value accepted as a file descriptor
pub const MAX_FD: i64 = 0x7fff_ffff;

/// Flag for `copy_file`: fail if the destination already exists
pub const COPYFILE_EXCL: u32 = 1;
