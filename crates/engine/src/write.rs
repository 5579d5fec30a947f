//! Write path: `put()`, `delete()`, and the memtable flush to L0.
//!
//! Each write is enqueued for the background WAL batch (asynchronously) and
//! applied to the owning shard's memtable and bloom filter synchronously,
//! so a reader that acquires the shard lock after `put` returns always sees
//! the new value.

use anyhow::{Context, Result};
use memtable::Memtable;
use sstable::{Builder, Table};
use std::sync::Arc;
use tracing::debug;

use crate::record::Record;
use crate::shard::ShardState;
use crate::{compaction, Store, MIN_FLUSH_RECORDS};

impl Store {
    /// Inserts a key-value pair.
    ///
    /// The record is offered to the WAL queue without blocking; if the
    /// queue is full the call blocks until the writer thread makes room
    /// (bounded back-pressure, never an unbounded task pile-up). The
    /// memtable insert happens under the shard write lock, and a memtable
    /// that reaches the flush threshold is flushed inline.
    ///
    /// # Errors
    ///
    /// Returns an error only for I/O failures during an inline flush. WAL
    /// delivery failures are logged by the writer thread; the write remains
    /// readable and the next checkpoint restores durability.
    pub fn put(&self, key: i64, value: Vec<u8>) -> Result<()> {
        let inner = &self.inner;
        if !inner.is_running() {
            return Ok(());
        }
        inner.stats.record_write();

        if let Err(record) = inner.queue.try_push(Record::new(key, value.clone())) {
            // Queue full: fall back to a blocking enqueue.
            inner.queue.push(record);
        }

        let shard = inner.shard_for(key);
        let mut state = shard.state.write();
        state.bloom.insert(key);
        state.memtable.put(key, value);

        if state.memtable.len() >= inner.config.storage.memtable_flush_threshold {
            self.flush_locked(shard.id, &mut state)?;
        }
        Ok(())
    }

    /// Deletes a key by writing a tombstone (a zero-length value).
    ///
    /// The tombstone propagates through WAL, memtable, L0, and L1 so the
    /// deletion shadows every older layer and survives restarts.
    pub fn delete(&self, key: i64) -> Result<()> {
        self.put(key, Vec::new())
    }

    /// Flushes the shard's memtable into a new L0 SSTable.
    ///
    /// Caller holds the shard write lock. Skipped entirely below
    /// [`MIN_FLUSH_RECORDS`] resident records — tiny runs cost more in read
    /// amplification than they save in memory.
    ///
    /// # Steps
    ///
    /// 1. Materialize the memtable as a sorted record vector.
    /// 2. Stream it into `shard-<id>-l0-<ns>.sst` (temp file + rename).
    /// 3. Open the new table, append it to the L0 list, rebuild the view.
    /// 4. Swap in a fresh memtable.
    /// 5. At `compaction_threshold` L0 runs, hand the shard to a background
    ///    compaction thread.
    pub(crate) fn flush_locked(&self, shard_id: usize, state: &mut ShardState) -> Result<()> {
        if state.memtable.len() < MIN_FLUSH_RECORDS {
            return Ok(());
        }
        let inner = &self.inner;

        let entries = state.memtable.to_sorted_vec();
        let file_name = format!("shard-{}-l0-{}.sst", shard_id, crate::now_nanos());
        let path = inner.dir.join(&file_name);

        let mut builder = Builder::create(&path)
            .with_context(|| format!("failed to create L0 table {}", path.display()))?;
        for (key, value) in &entries {
            builder.add(*key, value)?;
        }
        builder.finish()?;

        let table = Table::open(&path)
            .with_context(|| format!("failed to reopen flushed table {}", path.display()))?;
        state.l0.push(Arc::new(table));
        state.rebuild_table_view();
        state.memtable = Memtable::new();

        debug!(shard = shard_id, records = entries.len(), file = %file_name, "memtable flushed to L0");

        if state.l0.len() >= inner.config.storage.compaction_threshold {
            let inner = Arc::clone(inner);
            std::thread::spawn(move || compaction::compact_shard(&inner, shard_id));
        }
        Ok(())
    }
}
