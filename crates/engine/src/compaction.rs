//! Background L0 -> L1 compaction.
//!
//! Merges a shard's L0 runs into one new L1 run with newest-wins duplicate
//! suppression, then rebuilds and persists the shard's learned index over
//! the merged view. Tombstones survive the merge — under one-level leveling
//! an older run may still contain the deleted key.

use sstable::{Builder, MergeIterator, Table};
use std::sync::Arc;
use tracing::{info, warn};

use crate::learned_store;
use crate::{now_nanos, Inner};

/// Runs one compaction pass against `shard_id`.
///
/// The per-shard guard is acquired with `try_lock`; if another compaction
/// is already running the call simply returns. Input tables are snapshotted
/// under the read lock, so flushes keep landing new L0 runs while the merge
/// streams — those are preserved when the result is installed.
///
/// Any I/O failure aborts the pass: the partial output is discarded and the
/// input runs stay untouched, to be retried at the next trigger.
pub(crate) fn compact_shard(inner: &Arc<Inner>, shard_id: usize) {
    let shard = &inner.shards[shard_id];
    let _guard = match shard.compaction_guard.try_lock() {
        Some(g) => g,
        None => return,
    };

    let inputs: Vec<Arc<Table>> = shard.state.read().l0.clone();
    if inputs.len() < inner.config.storage.compaction_threshold {
        return;
    }

    // Inputs are in flush order (oldest first); the merge breaks key ties
    // in favor of the newest source.
    let input_refs: Vec<&Table> = inputs.iter().map(|t| t.as_ref()).collect();
    let mut merge = match MergeIterator::new(&input_refs) {
        Ok(m) => m,
        Err(e) => {
            warn!(shard = shard_id, error = %e, "compaction: failed to open inputs");
            return;
        }
    };

    let out_name = format!("shard-{}-l1-{}-compacted.sst", shard_id, now_nanos());
    let out_path = inner.dir.join(&out_name);
    let mut builder = match Builder::create(&out_path) {
        Ok(b) => b,
        Err(e) => {
            warn!(shard = shard_id, error = %e, "compaction: failed to create output");
            return;
        }
    };

    while let Some((key, value)) = merge.next_entry() {
        if let Err(e) = builder.add(key, &value) {
            warn!(shard = shard_id, error = %e, "compaction: write failed, aborting");
            builder.abort();
            return;
        }
    }
    if let Err(e) = builder.finish() {
        warn!(shard = shard_id, error = %e, "compaction: finish failed, aborting");
        return;
    }

    let new_table = match Table::open(&out_path) {
        Ok(t) => Arc::new(t),
        Err(e) => {
            warn!(shard = shard_id, error = %e, "compaction: cannot reopen output");
            let _ = std::fs::remove_file(&out_path);
            return;
        }
    };

    {
        let mut state = shard.state.write();
        // L0 runs flushed while we merged sit past the input prefix; they
        // become the new L0 list.
        let survivors = state.l0.split_off(inputs.len());
        state.l0 = survivors;
        state.l1.push(new_table);
        state.rebuild_table_view();
    }

    learned_store::rebuild_learned_index(inner, shard_id);

    for table in &inputs {
        let _ = std::fs::remove_file(table.path());
    }
    info!(
        shard = shard_id,
        merged = inputs.len(),
        output = %out_name,
        "compaction complete"
    );
}
