/*!
 * Error Types
 * Centralized error handling with thiserror and miette
 */

use miette::Diagnostic;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result of a filesystem operation
///
/// # Must Use
/// Filesystem operations can fail and must be handled to prevent data loss
#[must_use = "filesystem operations can fail and must be handled"]
pub type FsResult<T> = Result<T, FsError>;

/// Codes carried by argument errors, detected before any request is issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgErrorCode {
    InvalidArgValue,
    InvalidArgType,
    OutOfRange,
    InvalidState,
}

impl ArgErrorCode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ArgErrorCode::InvalidArgValue => "ERR_INVALID_ARG_VALUE",
            ArgErrorCode::InvalidArgType => "ERR_INVALID_ARG_TYPE",
            ArgErrorCode::OutOfRange => "ERR_OUT_OF_RANGE",
            ArgErrorCode::InvalidState => "ERR_INVALID_STATE",
        }
    }
}

impl fmt::Display for ArgErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dispatcher invariant violations
///
/// Any of these means a completion could not be matched to an in-flight
/// slot. That is a bug in the pool or the native layer, never a user error.
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum PoolError {
    #[error("completion for slot {id} but only {active} slots are active")]
    #[diagnostic(
        code(pool::not_active),
        help("The native layer reported a slot that was never issued or already completed.")
    )]
    NotActive { id: u32, active: usize },

    #[error("slot {0} is active without a continuation")]
    #[diagnostic(code(pool::missing_continuation))]
    MissingContinuation(u32),
}

/// Filesystem errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum FsError {
    /// Negative result reported by the native layer
    #[error("{code}: {message}")]
    #[diagnostic(code(fs::operation))]
    Operation {
        errno: i32,
        code: String,
        message: String,
        path: Option<PathBuf>,
    },

    /// Bad argument detected synchronously
    #[error("{message}")]
    #[diagnostic(code(fs::invalid_argument))]
    InvalidArgument { code: ArgErrorCode, message: String },

    #[error("{} is not a file", .0.display())]
    #[diagnostic(
        code(fs::not_a_file),
        help("Read streams can only be opened on regular files.")
    )]
    NotAFile(PathBuf),

    /// The continuation was dropped without being invoked
    #[error("operation canceled before completion")]
    #[diagnostic(code(fs::canceled))]
    Canceled,

    /// `block_on` ran out of work before its future resolved
    #[error("event loop stalled: nothing in flight and the future is still pending")]
    #[diagnostic(
        code(fs::stalled),
        help("The awaited future depends on something the filesystem loop does not drive.")
    )]
    Stalled,

    #[error("native backend failure: {0}")]
    #[diagnostic(code(fs::backend))]
    Backend(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Dispatch(#[from] PoolError),
}

impl FsError {
    pub(crate) fn invalid_arg(code: ArgErrorCode, message: impl Into<String>) -> Self {
        FsError::InvalidArgument {
            code,
            message: message.into(),
        }
    }

    /// Symbolic code (`ENOENT`, `ERR_OUT_OF_RANGE`, ...) when the error has one
    pub fn code(&self) -> Option<&str> {
        match self {
            FsError::Operation { code, .. } => Some(code),
            FsError::InvalidArgument { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }

    /// Negative errno for operation errors
    pub fn errno(&self) -> Option<i32> {
        match self {
            FsError::Operation { errno, .. } => Some(*errno),
            _ => None,
        }
    }

    #[inline]
    pub fn is_not_found(&self) -> bool {
        self.code() == Some("ENOENT")
    }

    #[inline]
    pub fn is_already_exists(&self) -> bool {
        self.code() == Some("EEXIST")
    }

    /// Attach the path the failed operation was working on
    pub fn with_path(self, p: impl Into<PathBuf>) -> Self {
        match self {
            FsError::Operation {
                errno,
                code,
                message,
                ..
            } => FsError::Operation {
                errno,
                code,
                message,
                path: Some(p.into()),
            },
            other => other,
        }
    }
}
