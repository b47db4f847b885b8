/*!
 * Errno Table
 * Maps negative native results to symbolic codes and messages
 */

use super::errors::FsError;
use ahash::RandomState;
use nix::errno::Errno;
use std::collections::HashMap;

/// Symbolic code and human message for one errno
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrnoEntry {
    pub code: String,
    pub message: String,
}

/// Lookup table from negative errno to `(code, message)`
///
/// Falls back to the host's errno names for anything not overridden, so the
/// default table covers every errno the platform can produce.
#[derive(Debug, Clone, Default)]
pub struct ErrnoTable {
    overrides: HashMap<i32, ErrnoEntry, RandomState>,
}

impl ErrnoTable {
    /// Table backed by the host's errno names
    pub fn system() -> Self {
        Self::default()
    }

    /// Override the entry for `errno` (negative, as reported by the native layer)
    #[must_use]
    pub fn with_entry(
        mut self,
        errno: i32,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.overrides.insert(
            negated(errno),
            ErrnoEntry {
                code: code.into(),
                message: message.into(),
            },
        );
        self
    }

    /// Look up a negative errno
    pub fn lookup(&self, errno: i32) -> ErrnoEntry {
        let errno = negated(errno);
        if let Some(entry) = self.overrides.get(&errno) {
            return entry.clone();
        }

        match Errno::from_raw(-errno) {
            Errno::UnknownErrno => ErrnoEntry {
                code: "UNKNOWN".into(),
                message: format!("unknown error {}", errno),
            },
            e => ErrnoEntry {
                code: format!("{:?}", e),
                message: e.desc().to_string(),
            },
        }
    }

    /// Build the operation error for a negative native result
    pub fn error(&self, errno: i32) -> FsError {
        let ErrnoEntry { code, message } = self.lookup(errno);
        FsError::Operation {
            errno: negated(errno),
            code,
            message,
            path: None,
        }
    }

    /// Build the operation error for a raw negative native result
    ///
    /// Results outside the `i32` range saturate instead of wrapping.
    pub fn result_error(&self, result: i64) -> FsError {
        self.error(i32::try_from(result).unwrap_or(i32::MIN))
    }
}

/// `-|errno|`, saturating at `-i32::MAX`
#[inline]
fn negated(errno: i32) -> i32 {
    -(errno.unsigned_abs().min(i32::MAX as u32) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_lookup() {
        let table = ErrnoTable::system();
        let entry = table.lookup(-(Errno::ENOENT as i32));
        assert_eq!(entry.code, "ENOENT");
        assert!(!entry.message.is_empty());
    }

    #[test]
    fn test_override_wins() {
        let table = ErrnoTable::system().with_entry(-2, "ENOENT", "gone");
        let err = table.error(-2);
        assert_eq!(err.to_string(), "ENOENT: gone");
        assert_eq!(err.errno(), Some(-2));
    }

    #[test]
    fn test_unknown_errno() {
        let table = ErrnoTable::system();
        let entry = table.lookup(-99_999);
        assert_eq!(entry.code, "UNKNOWN");
    }

    #[test]
    fn test_out_of_range_results_saturate() {
        let table = ErrnoTable::system();
        assert_eq!(table.error(i32::MIN).errno(), Some(-i32::MAX));
        assert_eq!(table.result_error(i64::MIN).errno(), Some(-i32::MAX));
        assert_eq!(table.result_error(i32::MIN as i64 - 5).code(), Some("UNKNOWN"));
        assert_eq!(table.result_error(-(Errno::EIO as i64)).code(), Some("EIO"));
    }
}
