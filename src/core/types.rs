/*!
 * Core Types
 * Handles and small value types shared across the crate
 */

use super::errors::{ArgErrorCode, FsError, FsResult};
use super::limits::MAX_FD;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Open file descriptor owned by the native layer
///
/// The value is never interpreted, only passed through. It must be closed
/// exactly once; double-close and use-after-close are caller errors.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fd(i32);

impl Fd {
    /// Validate a descriptor value coming from outside the crate
    pub fn new(raw: i64) -> FsResult<Self> {
        if !(0..=MAX_FD).contains(&raw) {
            return Err(FsError::invalid_arg(
                ArgErrorCode::OutOfRange,
                format!(
                    "File descriptor is out of range. It must be >= 0 && <= {}. Received {}",
                    MAX_FD, raw
                ),
            ));
        }
        Ok(Self(raw as i32))
    }

    /// Wrap a descriptor the native layer just returned
    #[inline]
    pub(crate) const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Fd {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Open directory stream held by the native layer
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirHandle(pub(crate) u64);

impl DirHandle {
    #[inline]
    #[must_use]
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

/// File offset for positioned I/O; `None` uses and advances the descriptor's position
pub type Position = Option<u64>;
