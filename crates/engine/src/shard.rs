//! One independent stripe of the engine.
//!
//! A shard owns its memtable, its L0/L1 table lists, its learned indexes,
//! and a bloom filter over every key ever admitted. All of it sits behind a
//! single reader-writer lock; the separate compaction guard ensures at most
//! one compaction runs against the shard at a time.

use bloom::BloomFilter;
use learned::LearnedIndex;
use memtable::Memtable;
use parking_lot::{Mutex, RwLock};
use sstable::Table;
use std::sync::Arc;

pub(crate) struct Shard {
    pub(crate) id: usize,
    pub(crate) state: RwLock<ShardState>,
    /// Non-reentrant compaction guard, acquired with `try_lock`.
    pub(crate) compaction_guard: Mutex<()>,
}

pub(crate) struct ShardState {
    pub(crate) memtable: Memtable,
    /// L0 runs in flush order, newest last. Key ranges may overlap.
    pub(crate) l0: Vec<Arc<Table>>,
    /// L1 runs in compaction order, newest last.
    pub(crate) l1: Vec<Arc<Table>>,
    /// Learned indexes over the most recent compacted view, newest last.
    pub(crate) learned: Vec<Arc<LearnedIndex>>,
    /// Convenience view `l1 ∥ l0` (oldest-first) for O(1) read-path walks.
    pub(crate) tables: Vec<Arc<Table>>,
    /// Superset filter over all keys ever admitted to this shard.
    pub(crate) bloom: BloomFilter,
}

impl Shard {
    pub(crate) fn new(id: usize, bloom_size: usize, bloom_false_prob: f64) -> Self {
        Self {
            id,
            state: RwLock::new(ShardState::fresh(bloom_size, bloom_false_prob)),
            compaction_guard: Mutex::new(()),
        }
    }
}

impl ShardState {
    pub(crate) fn fresh(bloom_size: usize, bloom_false_prob: f64) -> Self {
        Self {
            memtable: Memtable::new(),
            l0: Vec::new(),
            l1: Vec::new(),
            learned: Vec::new(),
            tables: Vec::new(),
            bloom: BloomFilter::new(bloom_size, bloom_false_prob),
        }
    }

    /// Recomputes the combined table view. Must be called whenever `l0` or
    /// `l1` changes; holders of the write lock do this before releasing it.
    pub(crate) fn rebuild_table_view(&mut self) {
        let mut combined = Vec::with_capacity(self.l1.len() + self.l0.len());
        combined.extend(self.l1.iter().cloned());
        combined.extend(self.l0.iter().cloned());
        self.tables = combined;
    }
}
