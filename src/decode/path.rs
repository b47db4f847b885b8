/*!
 * Path Block Decoding
 * NUL-terminated path blocks returned by readlink and realpath
 */

use crate::core::limits::{PATH_BLOCK_SIZE, PATH_MAX};
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

/// Zeroed path block
pub fn new_path_block() -> Vec<u8> {
    vec![0; PATH_BLOCK_SIZE]
}

/// Copy `path` into the block and terminate it (native layer side)
///
/// Returns `false` if the path does not fit.
pub fn encode_path(block: &mut [u8], path: &[u8]) -> bool {
    if path.len() > PATH_MAX || path.len() >= block.len() {
        return false;
    }
    block[..path.len()].copy_from_slice(path);
    block[path.len()] = 0;
    true
}

/// Bytes up to the first NUL, taken verbatim (no resolution)
pub fn decode_path(block: &[u8]) -> PathBuf {
    let end = block.iter().position(|&b| b == 0).unwrap_or(block.len());
    PathBuf::from(OsStr::from_bytes(&block[..end]))
}
