//! Engine configuration.
//!
//! A [`Config`] is built once at startup — from a TOML file via
//! [`Config::load`], or programmatically — and passed to [`crate::Store`].
//! Missing or out-of-range fields fall back to the defaults, so a partial
//! config file is always usable.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub system: SystemConfig,
}

/// Write path and on-disk layout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for the WAL, SSTables, and learned index files.
    pub path: PathBuf,
    /// Capacity of the WAL record queue (records).
    pub wal_buffer_size: usize,
    /// Memtable record count that triggers a flush to L0.
    pub memtable_flush_threshold: usize,
    /// L0 SSTable count that triggers L0 -> L1 compaction.
    pub compaction_threshold: usize,
    /// Maximum records per WAL batch write.
    pub wal_batch_size: usize,
}

/// Sharding and filter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Number of independent shards; keys route by `key mod shard_count`.
    pub shard_count: usize,
    /// Per-shard bloom filter expected capacity.
    pub bloom_size: usize,
    /// Per-shard bloom filter target false-positive probability.
    pub bloom_false_prob: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            system: SystemConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("loom_data"),
            wal_buffer_size: 5000,
            memtable_flush_threshold: 2000,
            compaction_threshold: 4,
            wal_batch_size: 500,
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            shard_count: 16,
            bloom_size: 100_000,
            bloom_false_prob: 0.01,
        }
    }
}

impl Config {
    /// Loads a config from a TOML file, then applies defaults to any field
    /// left at an unusable value.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read config {}", path.as_ref().display()))?;
        let mut cfg: Config = toml::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.as_ref().display()))?;
        cfg.apply_defaults();
        Ok(cfg)
    }

    /// Clamps zero/invalid settings back to their defaults.
    pub fn apply_defaults(&mut self) {
        let d = StorageConfig::default();
        if self.storage.wal_buffer_size == 0 {
            self.storage.wal_buffer_size = d.wal_buffer_size;
        }
        if self.storage.memtable_flush_threshold == 0 {
            self.storage.memtable_flush_threshold = d.memtable_flush_threshold;
        }
        if self.storage.compaction_threshold == 0 {
            self.storage.compaction_threshold = d.compaction_threshold;
        }
        if self.storage.wal_batch_size == 0 {
            self.storage.wal_batch_size = d.wal_batch_size;
        }

        let s = SystemConfig::default();
        if self.system.shard_count == 0 {
            self.system.shard_count = s.shard_count;
        }
        if self.system.bloom_size == 0 {
            self.system.bloom_size = s.bloom_size;
        }
        if !(0.0..1.0).contains(&self.system.bloom_false_prob)
            || self.system.bloom_false_prob == 0.0
        {
            self.system.bloom_false_prob = s.bloom_false_prob;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert_eq!(cfg.storage.memtable_flush_threshold, 2000);
        assert_eq!(cfg.storage.compaction_threshold, 4);
        assert_eq!(cfg.system.shard_count, 16);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let mut cfg: Config = toml::from_str(
            r#"
            [storage]
            path = "/tmp/x"
            wal_buffer_size = 0
            memtable_flush_threshold = 100
            compaction_threshold = 2
            wal_batch_size = 10

            [system]
            shard_count = 1
            bloom_size = 0
            bloom_false_prob = 2.0
            "#,
        )
        .unwrap();
        cfg.apply_defaults();

        assert_eq!(cfg.storage.memtable_flush_threshold, 100);
        assert_eq!(cfg.storage.wal_buffer_size, 5000); // zero -> default
        assert_eq!(cfg.system.bloom_size, 100_000); // zero -> default
        assert!((cfg.system.bloom_false_prob - 0.01).abs() < f64::EPSILON);
    }
}
