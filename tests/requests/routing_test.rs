/*!
 * Completion Routing Tests
 * Continuations reach their own caller whatever the completion order
 */

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use slotfs::{Fs, FsConfig, FsResult, ManualBackend, Stats};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use tempfile::TempDir;

fn manual_fs() -> (Fs, Arc<ManualBackend>) {
    let backend = Arc::new(ManualBackend::new());
    let fs = Fs::builder()
        .with_config(FsConfig::minimal())
        .with_backend(backend.clone())
        .build()
        .unwrap();
    (fs, backend)
}

type Seen = Rc<RefCell<Vec<(u64, FsResult<Stats>)>>>;

/// Files of distinct sizes so each stat result identifies its path
fn sized_files(dir: &TempDir, n: usize) -> Vec<std::path::PathBuf> {
    (0..n)
        .map(|i| {
            let path = dir.path().join(format!("f{}", i));
            std::fs::write(&path, vec![b'x'; i]).unwrap();
            path
        })
        .collect()
}

#[test]
fn test_b_completes_before_a() {
    let (fs, backend) = manual_fs();
    let dir = TempDir::new().unwrap();
    let paths = sized_files(&dir, 2);
    let seen: Seen = Rc::default();

    for (i, path) in paths.iter().enumerate() {
        let seen = seen.clone();
        fs.stat(path, move |r| seen.borrow_mut().push((i as u64, r)));
    }

    backend.perform(1);
    fs.poll().unwrap();
    backend.perform(0);
    fs.poll().unwrap();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].0, 1);
    for (expected, result) in seen.iter() {
        assert_eq!(result.as_ref().unwrap().size, *expected);
    }
    assert_eq!(fs.in_flight(), 0);
}

#[test]
fn test_shuffled_completions_route_to_issuers() {
    let (fs, backend) = manual_fs();
    let dir = TempDir::new().unwrap();
    let paths = sized_files(&dir, 24);
    let seen: Seen = Rc::default();

    for (i, path) in paths.iter().enumerate() {
        let seen = seen.clone();
        fs.stat(path, move |r| seen.borrow_mut().push((i as u64, r)));
    }
    assert_eq!(fs.in_flight(), 24);

    let mut order = backend.pending();
    order.shuffle(&mut StdRng::seed_from_u64(0x5eed));
    for index in order {
        backend.perform(index);
        fs.poll().unwrap();
    }

    let seen = seen.borrow();
    assert_eq!(seen.len(), 24);
    for (expected, result) in seen.iter() {
        assert_eq!(result.as_ref().unwrap().size, *expected);
    }
    assert_eq!(fs.stats().capacity, 24);
    assert_eq!(fs.in_flight(), 0);
}

#[test]
fn test_errors_route_with_their_path() {
    let (fs, backend) = manual_fs();
    let dir = TempDir::new().unwrap();
    let present = sized_files(&dir, 1).remove(0);
    let missing = dir.path().join("missing");
    let seen = Rc::new(RefCell::new(Vec::new()));

    for path in [&missing, &present] {
        let seen = seen.clone();
        let target = path.clone();
        fs.stat(path, move |r| seen.borrow_mut().push((target, r.is_ok())));
    }

    backend.perform(1);
    backend.perform(0);
    fs.poll().unwrap();

    let mut seen = seen.borrow().clone();
    seen.sort();
    let mut expected = vec![(missing, false), (present, true)];
    expected.sort();
    assert_eq!(seen, expected);
}

#[test]
fn test_continuation_issuing_new_work_reuses_slot() {
    let (fs, backend) = manual_fs();
    let dir = TempDir::new().unwrap();
    let path = sized_files(&dir, 1).remove(0);
    let done = Rc::new(RefCell::new(false));

    let chained = fs.clone();
    let flag = done.clone();
    let again = path.clone();
    fs.stat(&path, move |r| {
        r.unwrap();
        chained.stat(again, move |r| {
            r.unwrap();
            *flag.borrow_mut() = true;
        });
    });

    backend.perform(0);
    fs.poll().unwrap();
    assert_eq!(fs.in_flight(), 1);
    backend.perform(1);
    fs.poll().unwrap();

    assert!(*done.borrow());
    assert_eq!(fs.stats().capacity, 1);
}
