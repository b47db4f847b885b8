/*!
 * Filesystem Configuration
 *
 * Tunables for the native worker pool, directory batching and streams.
 */

use super::limits::{
    DEFAULT_INITIAL_SLOTS, DEFAULT_READDIR_BATCH, DEFAULT_WORKER_THREADS, SLOW_OP_THRESHOLD,
    STREAM_CHUNK_SIZE,
};
use super::errors::{ArgErrorCode, FsError, FsResult};
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Configuration for an `Fs` instance
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FsConfig {
    /// Blocking threads available to the thread-pool backend (default: 4)
    pub worker_threads: usize,

    /// Directory entries per native readdir round trip (default: 32)
    pub readdir_batch: usize,

    /// Ceiling on one read issued by a read stream (default: 64KB)
    pub stream_chunk_size: usize,

    /// Slots allocated up front (default: 16)
    pub initial_slots: usize,

    /// Completions slower than this are logged at warn level (default: 10ms)
    #[serde(with = "millis")]
    pub slow_op_threshold: Duration,
}

impl FsConfig {
    /// Create default configuration
    pub fn new() -> Self {
        Self {
            worker_threads: DEFAULT_WORKER_THREADS,
            readdir_batch: DEFAULT_READDIR_BATCH,
            stream_chunk_size: STREAM_CHUNK_SIZE,
            initial_slots: DEFAULT_INITIAL_SLOTS,
            slow_op_threshold: SLOW_OP_THRESHOLD,
        }
    }

    /// Smallest useful configuration, mostly for tests
    pub fn minimal() -> Self {
        Self {
            worker_threads: 1,
            readdir_batch: 4,
            stream_chunk_size: 4 * 1024,
            initial_slots: 0,
            slow_op_threshold: SLOW_OP_THRESHOLD,
        }
    }

    /// Defaults overridden by environment variables
    ///
    /// - SLOTFS_WORKERS: blocking worker threads
    /// - SLOTFS_READDIR_BATCH: entries per readdir round trip
    /// - SLOTFS_STREAM_CHUNK: read stream chunk ceiling in bytes
    /// - SLOTFS_INITIAL_SLOTS: slots allocated up front
    pub fn from_env() -> Self {
        let mut config = Self::new();
        config.worker_threads = env_or("SLOTFS_WORKERS", config.worker_threads);
        config.readdir_batch = env_or("SLOTFS_READDIR_BATCH", config.readdir_batch);
        config.stream_chunk_size = env_or("SLOTFS_STREAM_CHUNK", config.stream_chunk_size);
        config.initial_slots = env_or("SLOTFS_INITIAL_SLOTS", config.initial_slots);
        config.sanitized()
    }

    /// Parse a JSON document; omitted fields keep their defaults
    pub fn from_json(raw: &str) -> FsResult<Self> {
        serde_json::from_str::<Self>(raw)
            .map(Self::sanitized)
            .map_err(|e| {
                FsError::invalid_arg(
                    ArgErrorCode::InvalidArgValue,
                    format!("Invalid filesystem configuration: {}", e),
                )
            })
    }

    /// Replace zero sizes that would stall the engines with defaults and cap
    /// the stream chunk at its ceiling
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        if self.worker_threads == 0 {
            self.worker_threads = DEFAULT_WORKER_THREADS;
        }
        if self.readdir_batch == 0 {
            self.readdir_batch = DEFAULT_READDIR_BATCH;
        }
        if self.stream_chunk_size == 0 {
            self.stream_chunk_size = STREAM_CHUNK_SIZE;
        }
        self.stream_chunk_size = self.stream_chunk_size.min(STREAM_CHUNK_SIZE);
        self
    }
}

impl Default for FsConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn env_or<T: FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key = key, value = %raw, "Ignoring unparsable configuration value");
            default
        }),
        Err(_) => default,
    }
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitized_replaces_zeroes() {
        let config = FsConfig {
            worker_threads: 0,
            readdir_batch: 0,
            stream_chunk_size: 0,
            ..FsConfig::new()
        }
        .sanitized();
        assert_eq!(config, FsConfig::new());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: FsConfig =
            serde_json::from_str(r#"{"readdir_batch": 8, "slow_op_threshold": 50}"#).unwrap();
        assert_eq!(config.readdir_batch, 8);
        assert_eq!(config.slow_op_threshold, Duration::from_millis(50));
        assert_eq!(config.worker_threads, DEFAULT_WORKER_THREADS);
    }

    #[test]
    fn test_from_json_rejects_unknown() {
        let err = FsConfig::from_json(r#"{"bogus": 1}"#).unwrap_err();
        assert_eq!(err.code(), Some("ERR_INVALID_ARG_VALUE"));
    }

    #[test]
    fn test_from_json_sanitizes() {
        let config = FsConfig::from_json(r#"{"stream_chunk_size": 0}"#).unwrap();
        assert_eq!(config.stream_chunk_size, STREAM_CHUNK_SIZE);

        let config = FsConfig::from_json(r#"{"stream_chunk_size": 1048576}"#).unwrap();
        assert_eq!(config.stream_chunk_size, STREAM_CHUNK_SIZE);
    }
}
