/*!
 * Configuration Tests
 * Environment overrides; serialized because they touch process env
 */

use serial_test::serial;
use slotfs::core::limits::{DEFAULT_READDIR_BATCH, DEFAULT_WORKER_THREADS};
use slotfs::{Fs, FsConfig};

fn with_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
    for (key, value) in vars {
        std::env::set_var(key, value);
    }
    let result = f();
    for (key, _) in vars {
        std::env::remove_var(key);
    }
    result
}

#[test]
#[serial]
fn test_env_overrides() {
    let config = with_env(
        &[("SLOTFS_READDIR_BATCH", "7"), ("SLOTFS_WORKERS", "2")],
        FsConfig::from_env,
    );
    assert_eq!(config.readdir_batch, 7);
    assert_eq!(config.worker_threads, 2);
}

#[test]
#[serial]
fn test_unparsable_and_zero_values_fall_back() {
    let config = with_env(
        &[("SLOTFS_READDIR_BATCH", "lots"), ("SLOTFS_WORKERS", "0")],
        FsConfig::from_env,
    );
    assert_eq!(config.readdir_batch, DEFAULT_READDIR_BATCH);
    assert_eq!(config.worker_threads, DEFAULT_WORKER_THREADS);
}

#[test]
#[serial]
fn test_fs_from_env_uses_config() {
    let fs = with_env(&[("SLOTFS_INITIAL_SLOTS", "5")], Fs::from_env).unwrap();
    assert_eq!(fs.config().initial_slots, 5);
    assert_eq!(fs.stats().capacity, 5);
}
