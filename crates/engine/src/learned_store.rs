//! Learned index lifecycle: rebuild from SSTables, persistence, and the
//! signature scheme that detects stale `.li` files.
//!
//! A persisted index is only trustworthy if the SSTable set it was built
//! from is still the live set. The filename therefore embeds an FNV-1a 64
//! hash over each table's `basename|size|mtime;` — any flush, compaction,
//! or checkpoint changes the signature, and a stale file is simply ignored
//! at restart (and pruned at the next persist).

use learned::{LearnedIndex, Record};
use sstable::Table;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

use crate::Inner;

/// Rebuilds the shard's learned index from its current SSTable view.
///
/// Walks the view newest-to-oldest, keeping the first (newest) value seen
/// per key — tombstones included, so deletions stay visible through the
/// index. The shard's learned list is replaced with the single fresh index,
/// which is then persisted beside the tables.
pub(crate) fn rebuild_learned_index(inner: &Inner, shard_id: usize) {
    let shard = &inner.shards[shard_id];
    let tables: Vec<Arc<Table>> = shard.state.read().tables.clone();

    if tables.is_empty() {
        shard.state.write().learned.clear();
        return;
    }

    let mut latest: HashMap<i64, Vec<u8>> = HashMap::new();
    for table in tables.iter().rev() {
        let iter = match table.iter() {
            Ok(it) => it,
            Err(e) => {
                warn!(shard = shard_id, error = %e, "learned rebuild: unreadable table skipped");
                continue;
            }
        };
        for (key, value) in iter {
            latest.entry(key).or_insert(value);
        }
    }

    if latest.is_empty() {
        shard.state.write().learned.clear();
        return;
    }

    let records: Vec<Record> = latest
        .into_iter()
        .map(|(key, value)| Record::new(key, value))
        .collect();
    let rebuilt = Arc::new(LearnedIndex::build(records));

    shard.state.write().learned = vec![Arc::clone(&rebuilt)];
    persist_learned_index(inner, shard_id, &rebuilt);
}

/// Saves `index` under the shard's current signature and prunes any other
/// `.li` file belonging to the shard. Failures are logged, not fatal — the
/// index stays usable in memory and can be rebuilt at the next restart.
pub(crate) fn persist_learned_index(inner: &Inner, shard_id: usize, index: &LearnedIndex) {
    let sig = match signature(inner, shard_id) {
        Some(s) => s,
        None => return,
    };
    let path = learned_index_path(inner, shard_id, &sig);
    if let Err(e) = index.save(&path) {
        warn!(shard = shard_id, error = %e, "learned index persist failed");
        return;
    }
    prune_stale_files(inner, shard_id, &path);
    debug!(shard = shard_id, file = %path.display(), "learned index persisted");
}

/// Attempts to restore the shard's learned index from a `.li` file whose
/// signature matches the live SSTable set. Returns `true` on success.
pub(crate) fn try_load_persisted(inner: &Inner, shard_id: usize) -> bool {
    let sig = match signature(inner, shard_id) {
        Some(s) => s,
        None => return false,
    };
    let path = learned_index_path(inner, shard_id, &sig);
    let index = match LearnedIndex::load(&path) {
        Ok(idx) => idx,
        Err(_) => return false,
    };

    let shard = &inner.shards[shard_id];
    shard.state.write().learned = vec![Arc::new(index)];
    debug!(shard = shard_id, file = %path.display(), "learned index restored from disk");
    true
}

/// Content signature of the shard's live SSTable set: FNV-1a 64 over
/// `basename|size|mtime_ns;` per table, in view order. `None` when the
/// shard has no tables or any table's metadata is unreadable.
fn signature(inner: &Inner, shard_id: usize) -> Option<String> {
    let tables: Vec<Arc<Table>> = inner.shards[shard_id].state.read().tables.clone();
    if tables.is_empty() {
        return None;
    }

    let mut hash = FNV_OFFSET;
    for table in &tables {
        let meta = std::fs::metadata(table.path()).ok()?;
        let mtime_ns = meta
            .modified()
            .ok()?
            .duration_since(UNIX_EPOCH)
            .ok()?
            .as_nanos() as u64;
        let basename = table.path().file_name()?.to_string_lossy();

        let line = format!("{}|{}|{};", basename, meta.len(), mtime_ns);
        hash = fnv1a_64(hash, line.as_bytes());
    }
    Some(format!("{hash:x}"))
}

fn learned_index_path(inner: &Inner, shard_id: usize, sig: &str) -> PathBuf {
    inner.dir.join(format!("shard-{shard_id}-{sig}.li"))
}

/// Removes every `shard-<id>-*.li` other than `keep`.
fn prune_stale_files(inner: &Inner, shard_id: usize, keep: &PathBuf) {
    let prefix = format!("shard-{shard_id}-");
    let entries = match std::fs::read_dir(&inner.dir) {
        Ok(e) => e,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path == *keep {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with(&prefix) && name.ends_with(".li") {
            let _ = std::fs::remove_file(&path);
        }
    }
}

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x00000100000001b3;

/// FNV-1a 64-bit, continued from `hash`.
fn fnv1a_64(mut hash: u64, data: &[u8]) -> u64 {
    for &byte in data {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}
