//! Administrative operations: stats exposition, reset, and learned-index
//! diagnostics.

use anyhow::{bail, Result};
use learned::DiagnosticPoint;
use tracing::info;

use crate::shard::ShardState;
use crate::{StatsSnapshot, Store};

/// Diagnostic exports are capped at this many sampled points.
const EXPORT_CAP: usize = 5000;

impl Store {
    /// Returns an atomic snapshot of the engine's counters and layer sizes.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        let inner = &self.inner;
        let mut memtable_records = 0;
        let mut l0_tables = 0;
        let mut l1_tables = 0;
        let mut sstables = 0;
        let mut learned_indexes = 0;

        for shard in &inner.shards {
            let state = shard.state.read();
            memtable_records += state.memtable.len();
            l0_tables += state.l0.len();
            l1_tables += state.l1.len();
            sstables += state.tables.len();
            learned_indexes += state.learned.len();
        }

        let (reads, writes, hits) = inner.stats.snapshot();
        let wal_size_bytes = inner.backend.size().unwrap_or(0);

        StatsSnapshot {
            memtable_records,
            l0_tables,
            l1_tables,
            sstables,
            learned_indexes,
            shards: inner.shards.len(),
            reads,
            writes,
            hits,
            wal_queue_depth: inner.queue.len(),
            wal_size_bytes,
            read_write_ratio: inner.stats.read_write_ratio(),
        }
    }

    /// Deep-cleans the engine: truncates the WAL, deletes every `.sst` and
    /// `.li` file, resets all shards to empty, zeroes the counters, and
    /// discards anything still queued for the WAL.
    pub fn reset(&self) -> Result<()> {
        let inner = &self.inner;
        inner.backend.truncate()?;

        if let Ok(entries) = std::fs::read_dir(&inner.dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                let is_data_file = path
                    .extension()
                    .map(|e| e == "sst" || e == "li")
                    .unwrap_or(false);
                if is_data_file {
                    let _ = std::fs::remove_file(&path);
                }
            }
        }

        for shard in &inner.shards {
            let mut state = shard.state.write();
            *state = ShardState::fresh(
                inner.config.system.bloom_size,
                inner.config.system.bloom_false_prob,
            );
        }

        inner.stats.reset();
        inner.queue.drain();
        info!("reset complete");
        Ok(())
    }

    /// Collects sampled `(key, real, predicted, error)` tuples from every
    /// live learned index, for visualization. Capped at 5000 points.
    ///
    /// # Errors
    ///
    /// Fails when no learned index exists yet (nothing has been compacted
    /// or checkpointed).
    pub fn export_model_data(&self) -> Result<Vec<DiagnosticPoint>> {
        let mut points = Vec::new();
        for shard in &self.inner.shards {
            let state = shard.state.read();
            for li in &state.learned {
                points.extend(li.export_diagnostics());
            }
        }
        if points.is_empty() {
            bail!("no learned index data available");
        }
        points.truncate(EXPORT_CAP);
        Ok(points)
    }

    /// Times random point lookups through shard 0's newest learned index
    /// against plain binary search; returns `(avg_ns_binary, avg_ns_learned)`.
    ///
    /// # Errors
    ///
    /// Fails when shard 0 has no learned index yet.
    pub fn benchmark_algo(&self, iterations: usize) -> Result<(f64, f64)> {
        let state = self.inner.shards[0].state.read();
        match state.learned.last() {
            Some(li) => Ok(li.benchmark_internal(iterations)),
            None => bail!("no learned index data available (insert more data)"),
        }
    }
}
