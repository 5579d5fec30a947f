//! Workload counters and the engine stats snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free read/write/hit counters, updated on every operation.
///
/// The read/write ratio is the classic signal for index selection: a ratio
/// well above 1 favors the learned index, well below 1 favors staying in
/// the write-optimized layers.
#[derive(Debug, Default)]
pub struct WorkloadStats {
    reads: AtomicU64,
    writes: AtomicU64,
    hits: AtomicU64,
}

impl WorkloadStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns `(reads, writes, hits)`.
    #[must_use]
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.reads.load(Ordering::Relaxed),
            self.writes.load(Ordering::Relaxed),
            self.hits.load(Ordering::Relaxed),
        )
    }

    /// Reads per write. A pure-read workload reports 100.0, an idle one 0.0.
    #[must_use]
    pub fn read_write_ratio(&self) -> f64 {
        let reads = self.reads.load(Ordering::Relaxed);
        let writes = self.writes.load(Ordering::Relaxed);
        if writes == 0 {
            if reads > 0 {
                return 100.0;
            }
            return 0.0;
        }
        reads as f64 / writes as f64
    }

    /// Zeroes all counters.
    pub fn reset(&self) {
        self.reads.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time view of the engine, suitable for metrics exposition.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    /// Records resident across all shard memtables.
    pub memtable_records: usize,
    /// L0 SSTables across all shards.
    pub l0_tables: usize,
    /// L1 SSTables across all shards.
    pub l1_tables: usize,
    /// Total SSTables (l0 + l1).
    pub sstables: usize,
    /// Learned indexes currently live.
    pub learned_indexes: usize,
    /// Number of shards.
    pub shards: usize,
    pub reads: u64,
    pub writes: u64,
    pub hits: u64,
    /// Records waiting in the WAL queue.
    pub wal_queue_depth: usize,
    /// WAL file size in bytes.
    pub wal_size_bytes: u64,
    pub read_write_ratio: f64,
}
