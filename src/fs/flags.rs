/*!
 * Open Flags and Modes
 * fopen-style flag strings and octal mode strings
 */

use crate::core::{ArgErrorCode, FsError, FsResult};
use nix::fcntl::OFlag;
use nix::unistd::AccessFlags;
use std::str::FromStr;

/// `access` mode: existence only
pub const F_OK: i32 = AccessFlags::F_OK.bits();
/// `access` mode: readable
pub const R_OK: i32 = AccessFlags::R_OK.bits();
/// `access` mode: writable
pub const W_OK: i32 = AccessFlags::W_OK.bits();
/// `access` mode: executable
pub const X_OK: i32 = AccessFlags::X_OK.bits();

/// Flags passed to the native open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpenFlags(OFlag);

impl OpenFlags {
    pub const READ: OpenFlags = OpenFlags(OFlag::O_RDONLY);
    pub const READ_WRITE: OpenFlags = OpenFlags(OFlag::O_RDWR);

    /// Parse an fopen-style flag string (`r`, `w+`, `ax`, ...)
    pub fn parse(flags: &str) -> FsResult<Self> {
        let rdonly = OFlag::O_RDONLY;
        let rdwr = OFlag::O_RDWR;
        let wronly = OFlag::O_WRONLY;
        let sync = OFlag::O_SYNC;
        let excl = OFlag::O_EXCL;
        let trunc = OFlag::O_TRUNC | OFlag::O_CREAT;
        let append = OFlag::O_APPEND | OFlag::O_CREAT;

        let bits = match flags {
            "r" => rdonly,
            "rs" | "sr" => rdonly | sync,
            "r+" => rdwr,
            "rs+" | "sr+" => rdwr | sync,

            "w" => trunc | wronly,
            "wx" | "xw" => trunc | wronly | excl,
            "w+" => trunc | rdwr,
            "wx+" | "xw+" => trunc | rdwr | excl,

            "a" => append | wronly,
            "ax" | "xa" => append | wronly | excl,
            "as" | "sa" => append | wronly | sync,
            "a+" => append | rdwr,
            "ax+" | "xa+" => append | rdwr | excl,
            "as+" | "sa+" => append | rdwr | sync,

            other => {
                return Err(FsError::invalid_arg(
                    ArgErrorCode::InvalidArgValue,
                    format!("Invalid value in flags: {}", other),
                ))
            }
        };

        Ok(Self(bits))
    }

    /// Flags given as raw open(2) bits
    pub fn from_bits(bits: i32) -> Self {
        Self(OFlag::from_bits_truncate(bits))
    }

    #[inline]
    #[must_use]
    pub fn bits(self) -> i32 {
        self.0.bits()
    }

    #[inline]
    pub fn contains(self, flag: OFlag) -> bool {
        self.0.contains(flag)
    }
}

impl Default for OpenFlags {
    fn default() -> Self {
        Self::READ
    }
}

impl From<OFlag> for OpenFlags {
    fn from(flags: OFlag) -> Self {
        Self(flags)
    }
}

impl FromStr for OpenFlags {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Parse an octal mode string such as `"755"` or `"0o644"`
pub fn parse_mode(mode: &str) -> FsResult<u32> {
    let digits = mode.trim();
    let digits = digits.strip_prefix("0o").unwrap_or(digits);
    u32::from_str_radix(digits, 8).map_err(|_| {
        FsError::invalid_arg(
            ArgErrorCode::InvalidArgValue,
            "Mode must be a number or octal string",
        )
    })
}
