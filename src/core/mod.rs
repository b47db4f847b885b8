/*!
 * Core Module
 * Fundamental types, configuration and error handling
 */

pub mod config;
pub mod errno;
pub mod errors;
pub mod limits;
pub mod types;

// Re-export for convenience
pub use config::FsConfig;
pub use errno::{ErrnoEntry, ErrnoTable};
pub use errors::{ArgErrorCode, FsError, FsResult, PoolError};
pub use types::{DirHandle, Fd, Position};
