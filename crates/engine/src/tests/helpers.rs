use crate::config::{Config, StorageConfig, SystemConfig};
use crate::Store;
use std::path::Path;
use std::time::{Duration, Instant};

/// Single-shard config with small thresholds, rooted at `dir`.
pub fn test_config(dir: &Path) -> Config {
    Config {
        storage: StorageConfig {
            path: dir.to_path_buf(),
            wal_buffer_size: 1000,
            memtable_flush_threshold: 200,
            compaction_threshold: 2,
            wal_batch_size: 50,
        },
        system: SystemConfig {
            shard_count: 1,
            bloom_size: 10_000,
            bloom_false_prob: 0.01,
        },
    }
}

pub fn open_store(dir: &Path) -> Store {
    Store::open(test_config(dir)).expect("store should open")
}

/// Polls `cond` until it holds or the timeout expires. Background flushes
/// and compactions settle quickly, but never synchronously.
pub fn wait_for<F: FnMut() -> bool>(mut cond: F, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}

pub fn count_files_with_extension(dir: &Path, ext: &str) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .map(|x| x == ext)
                .unwrap_or(false)
        })
        .count()
}
