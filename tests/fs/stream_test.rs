/*!
 * Stream Engine Tests
 * Window clamping for the reader, ordering for the writer, and write/read
 * round trips over random contents and chunk sizes
 */

use bytes::Bytes;
use futures::{SinkExt, TryStreamExt};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use slotfs::{Fs, FsConfig, FsResult, ReadStreamOptions, StreamState, WriteStreamOptions};
use std::path::Path;
use tempfile::TempDir;

fn fs() -> Fs {
    Fs::builder().with_config(FsConfig::minimal()).build().unwrap()
}

fn read_window(fs: &Fs, path: &Path, options: ReadStreamOptions) -> FsResult<Vec<u8>> {
    let stream = fs.create_read_stream(path, options);
    let chunks: Vec<Bytes> = fs.block_on(stream.try_collect())??;
    Ok(chunks.concat())
}

fn file_of(dir: &TempDir, size: usize) -> std::path::PathBuf {
    let path = dir.path().join(format!("f{}", size));
    let data: Vec<u8> = (0..size).map(|i| (i % 256) as u8).collect();
    std::fs::write(&path, data).unwrap();
    path
}

#[test]
fn test_start_past_eof_yields_nothing() {
    let fs = fs();
    let dir = TempDir::new().unwrap();
    let path = file_of(&dir, 10);
    let options = ReadStreamOptions {
        start: 20,
        length: Some(5),
        end: None,
    };
    assert!(read_window(&fs, &path, options).unwrap().is_empty());
    assert_eq!(fs.in_flight(), 0);
}

#[test]
fn test_window_past_eof_is_truncated() {
    let fs = fs();
    let dir = TempDir::new().unwrap();
    let path = file_of(&dir, 10);
    let options = ReadStreamOptions {
        start: 4,
        length: Some(100),
        end: None,
    };
    let data = read_window(&fs, &path, options).unwrap();
    assert_eq!(data, (4u8..10).collect::<Vec<_>>());
}

#[test]
fn test_inclusive_end() {
    let fs = fs();
    let dir = TempDir::new().unwrap();
    let path = file_of(&dir, 10);
    let options = ReadStreamOptions {
        start: 2,
        end: Some(4),
        ..Default::default()
    };
    assert_eq!(read_window(&fs, &path, options).unwrap(), vec![2, 3, 4]);
}

#[test]
fn test_multi_chunk_window() {
    let fs = fs();
    let dir = TempDir::new().unwrap();
    // minimal config reads 4KiB per chunk
    let path = file_of(&dir, 10_000);
    let options = ReadStreamOptions {
        start: 1000,
        length: Some(8000),
        end: None,
    };
    let data = read_window(&fs, &path, options).unwrap();
    assert_eq!(data.len(), 8000);
    assert_eq!(data[0], (1000 % 256) as u8);
}

#[test]
fn test_reader_state_after_end() {
    let fs = fs();
    let dir = TempDir::new().unwrap();
    let path = file_of(&dir, 3);
    let stream = fs.create_read_stream(&path, ReadStreamOptions::default());

    let first = fs.block_on(stream.next_chunk()).unwrap().unwrap();
    assert_eq!(first.as_deref(), Some(&[0u8, 1, 2][..]));
    let end = fs.block_on(stream.next_chunk()).unwrap().unwrap();
    assert_eq!(end, None);
    assert_eq!(stream.state(), StreamState::Closed);
}

#[test]
fn test_writer_then_reader() {
    let fs = fs();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("piped");
    let mut writer = fs.create_write_stream(&path, WriteStreamOptions::default());

    fs.block_on(async {
        for i in 0..50u8 {
            writer.feed(Bytes::from(vec![i; 100])).await?;
        }
        writer.close().await
    })
    .unwrap()
    .unwrap();
    assert_eq!(writer.state(), StreamState::Closed);
    assert_eq!(writer.bytes_written(), 5000);

    let back = read_window(&fs, &path, ReadStreamOptions::default()).unwrap();
    let expected: Vec<u8> = (0..50u8).flat_map(|i| vec![i; 100]).collect();
    assert_eq!(back, expected);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_stream_round_trip(
        data in prop::collection::vec(any::<u8>(), 0..20_000),
        chunk in 1usize..9000,
        piece in 1usize..6000,
    ) {
        let config = FsConfig {
            stream_chunk_size: chunk,
            ..FsConfig::minimal()
        };
        let fs = Fs::builder().with_config(config).build().unwrap();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("round");

        let mut writer = fs.create_write_stream(&path, WriteStreamOptions::default());
        let pieces: Vec<Bytes> = data.chunks(piece).map(Bytes::copy_from_slice).collect();
        fs.block_on(async {
            for part in pieces {
                writer.send(part).await?;
            }
            writer.close().await
        })
        .unwrap()
        .unwrap();
        prop_assert_eq!(writer.bytes_written(), data.len() as u64);

        let stream = fs.create_read_stream(&path, ReadStreamOptions::default());
        let chunks: Vec<Bytes> = fs.block_on(stream.try_collect()).unwrap().unwrap();
        prop_assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= chunk));
        prop_assert_eq!(chunks.concat(), data.clone());

        let whole = fs.block_on(fs.promises().read_file(&path)).unwrap().unwrap();
        prop_assert_eq!(whole, data);
        prop_assert_eq!(fs.in_flight(), 0);
    }
}
