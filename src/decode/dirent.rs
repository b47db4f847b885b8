/*!
 * Directory Entry Decoding
 * Raw dirent batches to `Dirent` values
 */

use super::ByteOrder;
use crate::core::limits::{DIRENT_NAME_MAX, DIRENT_RECORD_SIZE};
use serde::{Deserialize, Serialize};
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

/// Kind of a directory entry, as reported by the native layer
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirentType {
    #[default]
    Unknown = 0,
    File = 1,
    Dir = 2,
    Symlink = 3,
    Fifo = 4,
    Socket = 5,
    CharDevice = 6,
    BlockDevice = 7,
}

impl DirentType {
    /// Unrecognised codes decode as `Unknown`
    pub const fn from_code(code: u32) -> Self {
        match code {
            1 => DirentType::File,
            2 => DirentType::Dir,
            3 => DirentType::Symlink,
            4 => DirentType::Fifo,
            5 => DirentType::Socket,
            6 => DirentType::CharDevice,
            7 => DirentType::BlockDevice,
            _ => DirentType::Unknown,
        }
    }

    #[inline]
    pub const fn code(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for DirentType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DirentType::Unknown => write!(f, "unknown"),
            DirentType::File => write!(f, "file"),
            DirentType::Dir => write!(f, "directory"),
            DirentType::Symlink => write!(f, "symlink"),
            DirentType::Fifo => write!(f, "fifo"),
            DirentType::Socket => write!(f, "socket"),
            DirentType::CharDevice => write!(f, "char device"),
            DirentType::BlockDevice => write!(f, "block device"),
        }
    }
}

/// One entry yielded by directory iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dirent {
    pub parent_path: PathBuf,
    pub name: OsString,
    pub kind: DirentType,
}

impl Dirent {
    /// Full path of the entry
    pub fn path(&self) -> PathBuf {
        self.parent_path.join(&self.name)
    }

    #[inline]
    pub fn is_file(&self) -> bool {
        self.kind == DirentType::File
    }

    #[inline]
    pub fn is_directory(&self) -> bool {
        self.kind == DirentType::Dir
    }

    #[inline]
    pub fn is_symbolic_link(&self) -> bool {
        self.kind == DirentType::Symlink
    }

    #[inline]
    pub fn is_fifo(&self) -> bool {
        self.kind == DirentType::Fifo
    }

    #[inline]
    pub fn is_socket(&self) -> bool {
        self.kind == DirentType::Socket
    }

    #[inline]
    pub fn is_character_device(&self) -> bool {
        self.kind == DirentType::CharDevice
    }

    #[inline]
    pub fn is_block_device(&self) -> bool {
        self.kind == DirentType::BlockDevice
    }
}

/// Zeroed block with room for `capacity` records
pub fn new_dirent_block(capacity: usize) -> Vec<u8> {
    vec![0; capacity * DIRENT_RECORD_SIZE]
}

/// Write record `index` of a batch block (native layer side)
///
/// Names longer than the record can hold are truncated. Returns `false` when
/// the block has no room for the record.
pub fn encode_dirent(
    block: &mut [u8],
    index: usize,
    kind: DirentType,
    name: &[u8],
    order: ByteOrder,
) -> bool {
    let base = index * DIRENT_RECORD_SIZE;
    if base + DIRENT_RECORD_SIZE > block.len() {
        return false;
    }

    let len = name.len().min(DIRENT_NAME_MAX);
    order.write_u32(block, base, kind.code());
    order.write_u32(block, base + 4, len as u32);
    block[base + 8..base + 8 + len].copy_from_slice(&name[..len]);
    true
}

/// Decode the first `count` records of a batch block, in block order
///
/// `count` is clamped to the number of records the block can hold.
pub fn decode_dirents(block: &[u8], count: usize, parent: &Path, order: ByteOrder) -> Vec<Dirent> {
    let count = count.min(block.len() / DIRENT_RECORD_SIZE);
    let mut entries = Vec::with_capacity(count);

    for i in 0..count {
        let base = i * DIRENT_RECORD_SIZE;
        let kind = DirentType::from_code(order.read_u32(block, base));
        let len = (order.read_u32(block, base + 4) as usize).min(DIRENT_NAME_MAX);
        let name = OsStr::from_bytes(&block[base + 8..base + 8 + len]).to_os_string();

        entries.push(Dirent {
            parent_path: parent.to_path_buf(),
            name,
            kind,
        });
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_preserves_order() {
        let order = ByteOrder::native();
        let mut block = new_dirent_block(4);
        assert!(encode_dirent(&mut block, 0, DirentType::File, b"zeta.txt", order));
        assert!(encode_dirent(&mut block, 1, DirentType::Dir, b"alpha", order));
        assert!(encode_dirent(&mut block, 2, DirentType::Symlink, b"link", order));

        let entries = decode_dirents(&block, 3, Path::new("/data"), order);
        let names: Vec<_> = entries.iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, vec!["zeta.txt", "alpha", "link"]);
        assert!(entries[0].is_file());
        assert!(entries[1].is_directory());
        assert!(entries[2].is_symbolic_link());
        assert_eq!(entries[1].path(), PathBuf::from("/data/alpha"));
    }

    #[test]
    fn test_count_is_clamped_to_block() {
        let order = ByteOrder::Big;
        let mut block = new_dirent_block(1);
        assert!(encode_dirent(&mut block, 0, DirentType::Fifo, b"pipe", order));
        assert!(!encode_dirent(&mut block, 1, DirentType::File, b"overflow", order));

        let entries = decode_dirents(&block, 10, Path::new("."), order);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_fifo());
    }

    #[test]
    fn test_unknown_type_code() {
        assert_eq!(DirentType::from_code(42), DirentType::Unknown);
        assert_eq!(DirentType::from_code(7), DirentType::BlockDevice);
        assert_eq!(DirentType::CharDevice.to_string(), "char device");
    }
}
