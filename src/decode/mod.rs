/*!
 * Binary Result Decoders
 *
 * Interpret the fixed-layout raw blocks the native layer writes (stat
 * records, directory entry batches, NUL-terminated paths) into structured
 * values. Every field is read at a documented offset with an explicit byte
 * order; no struct layout or alignment of the host is assumed.
 *
 * The matching encoders live next to each decoder and are what the native
 * layer uses to fill the blocks.
 */

mod dirent;
mod path;
mod stat;

pub use dirent::{decode_dirents, encode_dirent, new_dirent_block, Dirent, DirentType};
pub use path::{decode_path, encode_path, new_path_block};
pub use stat::{RawStat, Stats};

/// Byte order of the 32-bit words in a raw block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Byte order of the host, which is what the native layer writes
    #[inline]
    #[must_use]
    pub const fn native() -> Self {
        if cfg!(target_endian = "little") {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        }
    }

    #[inline]
    pub(crate) fn read_u32(self, raw: &[u8], at: usize) -> u32 {
        let mut word = [0u8; 4];
        word.copy_from_slice(&raw[at..at + 4]);
        match self {
            ByteOrder::Little => u32::from_le_bytes(word),
            ByteOrder::Big => u32::from_be_bytes(word),
        }
    }

    #[inline]
    pub(crate) fn write_u32(self, raw: &mut [u8], at: usize, value: u32) {
        let word = match self {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        };
        raw[at..at + 4].copy_from_slice(&word);
    }

    /// Combine the two words starting at word index `n` into one 64-bit value
    ///
    /// Little-endian blocks store the low word first, big-endian blocks the
    /// high word first.
    #[inline]
    pub(crate) fn read_u64(self, raw: &[u8], n: usize) -> u64 {
        let first = self.read_u32(raw, n * 4) as u64;
        let second = self.read_u32(raw, (n + 1) * 4) as u64;
        match self {
            ByteOrder::Little => first | (second << 32),
            ByteOrder::Big => (first << 32) | second,
        }
    }

    #[inline]
    pub(crate) fn write_u64(self, raw: &mut [u8], n: usize, value: u64) {
        let low = value as u32;
        let high = (value >> 32) as u32;
        let (first, second) = match self {
            ByteOrder::Little => (low, high),
            ByteOrder::Big => (high, low),
        };
        self.write_u32(raw, n * 4, first);
        self.write_u32(raw, (n + 1) * 4, second);
    }
}
