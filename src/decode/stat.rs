/*!
 * Stat Decoding
 * Raw stat block to `Stats`
 */

use super::{ByteOrder, DirentType};
use crate::core::limits::STAT_BLOCK_SIZE;
use nix::sys::stat::SFlag;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Raw stat block: 32 words, two per logical field
pub type RawStat = [u8; STAT_BLOCK_SIZE];

// Word offsets of each logical 64-bit field
const DEV: usize = 0;
const MODE: usize = 2;
const NLINK: usize = 4;
const UID: usize = 6;
const GID: usize = 8;
const RDEV: usize = 10;
const INO: usize = 12;
const SIZE: usize = 14;
const BLKSIZE: usize = 16;
const BLOCKS: usize = 18;
const FLAGS: usize = 20;
const GEN: usize = 22;
const ATIME: usize = 24;
const MTIME: usize = 26;
const CTIME: usize = 28;
const BIRTHTIME: usize = 30;

/// File status as reported by stat, lstat and fstat
///
/// Type predicates are derived from `mode`; nothing is stored twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Stats {
    pub dev: u64,
    pub mode: u64,
    pub nlink: u64,
    pub uid: u64,
    pub gid: u64,
    pub rdev: u64,
    pub ino: u64,
    pub size: u64,
    pub blksize: u64,
    pub blocks: u64,
    pub flags: u64,
    pub gen: u64,
    pub atime_ms: i64,
    pub mtime_ms: i64,
    pub ctime_ms: i64,
    pub birthtime_ms: i64,
}

impl Stats {
    /// Decode a block written by the native layer on this host
    #[inline]
    pub fn decode(raw: &RawStat) -> Self {
        Self::decode_with(raw, ByteOrder::native())
    }

    /// Decode a block written with an explicit byte order
    pub fn decode_with(raw: &RawStat, order: ByteOrder) -> Self {
        let field = |n| order.read_u64(raw, n);
        Self {
            dev: field(DEV),
            mode: field(MODE),
            nlink: field(NLINK),
            uid: field(UID),
            gid: field(GID),
            rdev: field(RDEV),
            ino: field(INO),
            size: field(SIZE),
            blksize: field(BLKSIZE),
            blocks: field(BLOCKS),
            flags: field(FLAGS),
            gen: field(GEN),
            atime_ms: field(ATIME) as i64,
            mtime_ms: field(MTIME) as i64,
            ctime_ms: field(CTIME) as i64,
            birthtime_ms: field(BIRTHTIME) as i64,
        }
    }

    /// Write this record into a raw block (native layer side)
    pub fn encode_into(&self, raw: &mut RawStat, order: ByteOrder) {
        let fields = [
            (DEV, self.dev),
            (MODE, self.mode),
            (NLINK, self.nlink),
            (UID, self.uid),
            (GID, self.gid),
            (RDEV, self.rdev),
            (INO, self.ino),
            (SIZE, self.size),
            (BLKSIZE, self.blksize),
            (BLOCKS, self.blocks),
            (FLAGS, self.flags),
            (GEN, self.gen),
            (ATIME, self.atime_ms as u64),
            (MTIME, self.mtime_ms as u64),
            (CTIME, self.ctime_ms as u64),
            (BIRTHTIME, self.birthtime_ms as u64),
        ];
        for (n, value) in fields {
            order.write_u64(raw, n, value);
        }
    }

    #[inline]
    fn kind_bits(&self) -> u64 {
        self.mode & SFlag::S_IFMT.bits() as u64
    }

    #[inline]
    fn is_kind(&self, flag: SFlag) -> bool {
        self.kind_bits() == flag.bits() as u64
    }

    #[inline]
    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.is_kind(SFlag::S_IFDIR)
    }

    #[inline]
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.is_kind(SFlag::S_IFREG)
    }

    #[inline]
    #[must_use]
    pub fn is_block_device(&self) -> bool {
        self.is_kind(SFlag::S_IFBLK)
    }

    #[inline]
    #[must_use]
    pub fn is_character_device(&self) -> bool {
        self.is_kind(SFlag::S_IFCHR)
    }

    #[inline]
    #[must_use]
    pub fn is_fifo(&self) -> bool {
        self.is_kind(SFlag::S_IFIFO)
    }

    #[inline]
    #[must_use]
    pub fn is_symbolic_link(&self) -> bool {
        self.is_kind(SFlag::S_IFLNK)
    }

    #[inline]
    #[must_use]
    pub fn is_socket(&self) -> bool {
        self.is_kind(SFlag::S_IFSOCK)
    }

    /// Entry kind in the directory-entry enumeration
    pub fn kind(&self) -> DirentType {
        if self.is_file() {
            DirentType::File
        } else if self.is_directory() {
            DirentType::Dir
        } else if self.is_symbolic_link() {
            DirentType::Symlink
        } else if self.is_fifo() {
            DirentType::Fifo
        } else if self.is_socket() {
            DirentType::Socket
        } else if self.is_character_device() {
            DirentType::CharDevice
        } else if self.is_block_device() {
            DirentType::BlockDevice
        } else {
            DirentType::Unknown
        }
    }

    /// Permission bits without the file type
    #[inline]
    #[must_use]
    pub fn permissions(&self) -> u32 {
        (self.mode & 0o7777) as u32
    }

    pub fn atime(&self) -> SystemTime {
        from_millis(self.atime_ms)
    }

    pub fn mtime(&self) -> SystemTime {
        from_millis(self.mtime_ms)
    }

    pub fn ctime(&self) -> SystemTime {
        from_millis(self.ctime_ms)
    }

    pub fn birthtime(&self) -> SystemTime {
        from_millis(self.birthtime_ms)
    }
}

fn from_millis(ms: i64) -> SystemTime {
    if ms >= 0 {
        UNIX_EPOCH + Duration::from_millis(ms as u64)
    } else {
        UNIX_EPOCH - Duration::from_millis(ms.unsigned_abs())
    }
}
