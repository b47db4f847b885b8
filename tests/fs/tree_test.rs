/*!
 * Tree Operation Tests
 * Recursive mkdir, rm and cp
 */

use slotfs::{CpOptions, Fs, FsConfig, MkdirOptions, RmOptions};
use tempfile::TempDir;

fn fs() -> Fs {
    Fs::builder().with_config(FsConfig::minimal()).build().unwrap()
}

#[test]
fn test_recursive_mkdir_creates_ancestors_and_is_repeatable() {
    let fs = fs();
    let dir = TempDir::new().unwrap();
    let deep = dir.path().join("a/b/c/d");
    let p = fs.promises();

    fs.block_on(p.mkdir(&deep, MkdirOptions::recursive()))
        .unwrap()
        .unwrap();
    assert!(deep.is_dir());
    let before = std::fs::metadata(&deep).unwrap().modified().unwrap();

    fs.block_on(p.mkdir(&deep, MkdirOptions::recursive()))
        .unwrap()
        .unwrap();
    let after = std::fs::metadata(&deep).unwrap().modified().unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_plain_mkdir_reports_missing_parent() {
    let fs = fs();
    let dir = TempDir::new().unwrap();
    let err = fs
        .mkdir_sync(dir.path().join("x/y"), MkdirOptions::default())
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_rm_requires_recursive_for_directories() {
    let fs = fs();
    let dir = TempDir::new().unwrap();
    let tree = dir.path().join("tree");
    fs.mkdir_sync(tree.join("nested"), MkdirOptions::recursive()).unwrap();
    fs.write_file_sync(tree.join("nested/file"), "x").unwrap();

    let err = fs
        .block_on(fs.promises().rm(&tree, RmOptions::default()))
        .unwrap()
        .unwrap_err();
    assert_eq!(err.code(), Some("EISDIR"));

    let options = RmOptions {
        recursive: true,
        force: false,
    };
    fs.block_on(fs.promises().rm(&tree, options)).unwrap().unwrap();
    assert!(!tree.exists());
}

#[test]
fn test_cp_copies_files_dirs_and_links() {
    let fs = fs();
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    fs.mkdir_sync(src.join("inner"), MkdirOptions::recursive()).unwrap();
    fs.write_file_sync(src.join("inner/data"), "payload").unwrap();
    fs.symlink_sync("inner/data", src.join("link")).unwrap();

    let options = CpOptions {
        recursive: true,
        ..Default::default()
    };
    fs.cp_sync(&src, &dst, options).unwrap();

    assert_eq!(fs.read_file_sync(dst.join("inner/data")).unwrap(), b"payload");
    assert_eq!(
        fs.readlink_sync(dst.join("link")).unwrap(),
        std::path::PathBuf::from("inner/data")
    );
}
