/*!
 * Facade Scenarios
 * Descriptor I/O, metadata and symlinks through the callback, sync and
 * future-returning surfaces
 */

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use slotfs::{Fs, FsConfig, OpenFlags};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use tempfile::TempDir;

fn fs() -> Fs {
    Fs::builder().with_config(FsConfig::minimal()).build().unwrap()
}

#[test]
fn test_positioned_read_of_foo() {
    let fs = fs();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("foo");
    std::fs::write(&path, b"foo\n").unwrap();

    let seen = Rc::new(RefCell::new(None));
    let reader = fs.clone();
    let out = seen.clone();
    fs.open(&path, OpenFlags::READ, 0o666, move |fd| {
        let fd = fd.unwrap();
        let closer = reader.clone();
        reader
            .read(fd, vec![0; 4], 0, 4, Some(0), move |r| {
                *out.borrow_mut() = Some(r);
                closer.close(fd, |r| r.unwrap());
            })
            .unwrap();
    });
    fs.run().unwrap();

    let (n, buf) = seen.borrow_mut().take().unwrap().unwrap();
    assert_eq!(n, 4);
    assert_eq!(buf, b"foo\n");
}

#[test]
fn test_write_then_read_back() {
    let fs = fs();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rw");
    let p = fs.promises();

    let back = fs
        .block_on(async {
            let fd = p.open(&path, OpenFlags::parse("w+")?, 0o644).await?;
            let written = p.write(fd, "foo\n", None).await?;
            let (n, buf) = p.read(fd, vec![0; 4], 0, 4, Some(0)).await?;
            p.close(fd).await?;
            Ok::<_, slotfs::FsError>((written, n, buf))
        })
        .unwrap()
        .unwrap();
    assert_eq!(back, (4, 4, b"foo\n".to_vec()));
}

#[test]
fn test_readlink_is_verbatim() {
    let fs = fs();
    let dir = TempDir::new().unwrap();
    let link = dir.path().join("link");
    let p = fs.promises();

    let target = fs
        .block_on(async {
            p.symlink("foo.txt", &link).await?;
            p.readlink(&link).await
        })
        .unwrap()
        .unwrap();
    assert_eq!(target, PathBuf::from("foo.txt"));
}

#[test]
fn test_rename_and_unlink() {
    let fs = fs();
    let dir = TempDir::new().unwrap();
    let from = dir.path().join("a");
    let to = dir.path().join("b");
    fs.write_file_sync(&from, "x").unwrap();

    fs.rename_sync(&from, &to).unwrap();
    assert!(!fs.exists_sync(&from));
    assert!(fs.exists_sync(&to));

    fs.unlink_sync(&to).unwrap();
    let err = fs.unlink_sync(&to).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_ftruncate_and_fstat() {
    let fs = fs();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("t");
    fs.write_file_sync(&path, "0123456789").unwrap();

    let fd = fs.open_sync(&path, OpenFlags::READ_WRITE, 0o666).unwrap();
    fs.ftruncate_sync(fd, 3).unwrap();
    assert_eq!(fs.fstat_sync(fd).unwrap().size, 3);
    fs.close_sync(fd).unwrap();
    assert_eq!(fs.read_file_sync(&path).unwrap(), b"012");
}

#[test]
fn test_chmod_sets_permission_bits() {
    let fs = fs();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("m");
    fs.write_file_sync(&path, "").unwrap();

    fs.chmod_sync(&path, 0o600).unwrap();
    assert_eq!(fs.stat_sync(&path).unwrap().permissions(), 0o600);
}

#[test]
fn test_realpath_resolves_symlinks() {
    let fs = fs();
    let dir = TempDir::new().unwrap();
    let real = fs.realpath_sync(dir.path()).unwrap();
    fs.mkdir_sync(real.join("d"), Default::default()).unwrap();
    fs.symlink_sync(real.join("d"), real.join("l")).unwrap();
    assert_eq!(fs.realpath_sync(real.join("l")).unwrap(), real.join("d"));
}

#[test]
fn test_readdir_lists_every_entry() {
    let fs = fs();
    let dir = TempDir::new().unwrap();
    for name in ["a", "b", "c", "d", "e", "f"] {
        fs.write_file_sync(dir.path().join(name), name).unwrap();
    }
    fs.mkdir_sync(dir.path().join("sub"), Default::default()).unwrap();

    let mut names: Vec<_> = fs
        .block_on(fs.promises().readdir(dir.path()))
        .unwrap()
        .unwrap()
        .into_iter()
        .map(|n| n.into_string().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, vec!["a", "b", "c", "d", "e", "f", "sub"]);

    let typed = fs.readdir_with_types_sync(dir.path()).unwrap();
    assert_eq!(typed.iter().filter(|e| e.is_directory()).count(), 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_whole_file_round_trip(data in prop::collection::vec(any::<u8>(), 0..20_000)) {
        let fs = fs();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data");
        let p = fs.promises();

        let back = fs
            .block_on(async {
                p.write_file(&path, data.clone()).await?;
                p.read_file(&path).await
            })
            .unwrap()
            .unwrap();
        prop_assert_eq!(&back, &data);
        prop_assert_eq!(fs.read_file_sync(&path).unwrap(), data);
    }
}
