/*!
 * Raw Layout Properties
 * Stat and dirent blocks decoded in both byte orders from hand-built words
 */

use proptest::prelude::*;
use slotfs::core::limits::{DIRENT_RECORD_SIZE, STAT_BLOCK_SIZE};
use slotfs::decode::{decode_dirents, encode_dirent, new_dirent_block, ByteOrder, RawStat};
use slotfs::{DirentType, Stats};
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// Lay out `value` at word `n` without going through the crate's encoder
fn put_field(raw: &mut RawStat, n: usize, value: u64, order: ByteOrder) {
    let (low, high) = (value as u32, (value >> 32) as u32);
    let (first, second) = match order {
        ByteOrder::Little => (low.to_le_bytes(), high.to_le_bytes()),
        ByteOrder::Big => (high.to_be_bytes(), low.to_be_bytes()),
    };
    raw[n * 4..n * 4 + 4].copy_from_slice(&first);
    raw[n * 4 + 4..n * 4 + 8].copy_from_slice(&second);
}

fn byte_order() -> impl Strategy<Value = ByteOrder> {
    prop_oneof![Just(ByteOrder::Little), Just(ByteOrder::Big)]
}

fn kind() -> impl Strategy<Value = DirentType> {
    (0u32..8).prop_map(DirentType::from_code)
}

proptest! {
    #[test]
    fn prop_stat_fields_reassemble_exactly(
        fields in prop::array::uniform16(any::<u64>()),
        order in byte_order(),
    ) {
        let mut raw = [0u8; STAT_BLOCK_SIZE];
        for (i, value) in fields.iter().enumerate() {
            put_field(&mut raw, i * 2, *value, order);
        }

        let stats = Stats::decode_with(&raw, order);
        let decoded = [
            stats.dev, stats.mode, stats.nlink, stats.uid, stats.gid, stats.rdev,
            stats.ino, stats.size, stats.blksize, stats.blocks, stats.flags, stats.gen,
            stats.atime_ms as u64, stats.mtime_ms as u64, stats.ctime_ms as u64,
            stats.birthtime_ms as u64,
        ];
        prop_assert_eq!(decoded, fields);
    }

    #[test]
    fn prop_wrong_order_swaps_words(size in any::<u64>()) {
        let mut raw = [0u8; STAT_BLOCK_SIZE];
        put_field(&mut raw, 14, size, ByteOrder::Little);
        let misread = Stats::decode_with(&raw, ByteOrder::Big).size;
        let swapped = ((size as u32).swap_bytes() as u64) << 32
            | ((size >> 32) as u32).swap_bytes() as u64;
        prop_assert_eq!(misread, swapped);
    }

    #[test]
    fn prop_dirent_batch_keeps_order(
        entries in prop::collection::vec(
            (kind(), prop::collection::vec(1u8..=255, 1..64)),
            0..16,
        ),
        order in byte_order(),
        capacity in 1usize..16,
    ) {
        let mut block = new_dirent_block(capacity);
        prop_assert_eq!(block.len(), capacity * DIRENT_RECORD_SIZE);

        let mut written = 0;
        for (i, (kind, name)) in entries.iter().enumerate() {
            if !encode_dirent(&mut block, i, *kind, name, order) {
                break;
            }
            written += 1;
        }
        prop_assert_eq!(written, entries.len().min(capacity));

        let decoded = decode_dirents(&block, entries.len(), Path::new("/p"), order);
        prop_assert_eq!(decoded.len(), written);
        for (entry, (kind, name)) in decoded.iter().zip(&entries) {
            prop_assert_eq!(entry.kind, *kind);
            prop_assert_eq!(entry.name.as_os_str(), OsStr::from_bytes(name));
            prop_assert_eq!(entry.path(), Path::new("/p").join(OsStr::from_bytes(name)));
        }
    }
}
