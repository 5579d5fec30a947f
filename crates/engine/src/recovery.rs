//! Cold-start recovery: SSTable restore, learned index restore, WAL
//! replay, and the startup checkpoint.

use learned::Record;
use sstable::Table;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::learned_store;
use crate::{now_nanos, Inner};

/// Cleans up leftover `.sst.tmp` files from interrupted builds.
pub(crate) fn cleanup_tmp_files(dir: &Path) {
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let p = entry.path();
            if let Some(name) = p.file_name().and_then(|n| n.to_str()) {
                if name.ends_with(".sst.tmp") {
                    let _ = std::fs::remove_file(&p);
                }
            }
        }
    }
}

/// One parsed `.sst` filename: `shard-<id>-<l0|l1>-<ns>[-suffix].sst`.
struct SstEntry {
    path: PathBuf,
    shard_id: usize,
    level: u8,
    timestamp: u64,
}

fn parse_sst_name(path: &Path, shard_count: usize) -> Option<SstEntry> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(".sst")?;
    let parts: Vec<&str> = stem.split('-').collect();
    if parts.len() < 4 || parts[0] != "shard" {
        return None;
    }

    let shard_id: usize = parts[1].parse().ok()?;
    if shard_id >= shard_count {
        return None;
    }
    let level = match parts[2] {
        "l0" => 0,
        "l1" => 1,
        _ => return None,
    };
    let timestamp: u64 = parts[3].parse().ok()?;

    Some(SstEntry {
        path: path.to_path_buf(),
        shard_id,
        level,
        timestamp,
    })
}

/// Loads every recognizable `.sst` file into its shard and level, oldest
/// first, and re-admits all keys to the shard bloom filters.
///
/// Unparseable names and unopenable files are skipped with a log line — a
/// damaged run costs its contents, never startup.
pub(crate) fn restore_tables(inner: &Inner) {
    let entries = match std::fs::read_dir(&inner.dir) {
        Ok(e) => e,
        Err(_) => return,
    };

    let mut found: Vec<SstEntry> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().map(|x| x == "sst").unwrap_or(false))
        .filter_map(|p| parse_sst_name(&p, inner.shards.len()))
        .collect();

    found.sort_by_key(|e| (e.shard_id, e.level, e.timestamp));

    let mut restored = 0usize;
    for entry in found {
        let table = match Table::open(&entry.path) {
            Ok(t) => Arc::new(t),
            Err(e) => {
                warn!(file = %entry.path.display(), error = %e, "skipping unreadable sstable");
                continue;
            }
        };

        let shard = &inner.shards[entry.shard_id];
        let mut state = shard.state.write();
        match table.iter() {
            Ok(iter) => {
                for (key, _) in iter {
                    state.bloom.insert(key);
                }
            }
            Err(e) => {
                warn!(file = %entry.path.display(), error = %e, "bloom re-population failed");
            }
        }
        if entry.level == 0 {
            state.l0.push(table);
        } else {
            state.l1.push(table);
        }
        state.rebuild_table_view();
        restored += 1;
    }

    info!(restored, "sstable restore complete");
}

/// Restores each shard's learned index: a persisted `.li` whose signature
/// matches the live table set is loaded; otherwise the index is rebuilt
/// (and re-persisted) from the tables.
pub(crate) fn restore_learned_indexes(inner: &Inner) {
    for shard in &inner.shards {
        if shard.state.read().tables.is_empty() {
            continue;
        }
        if learned_store::try_load_persisted(inner, shard.id) {
            continue;
        }
        learned_store::rebuild_learned_index(inner, shard.id);
    }
}

/// Replays the WAL into shard memtables (and bloom filters), returning the
/// number of records recovered. Replay failures are logged and treated as
/// an empty log.
pub(crate) fn replay_wal(inner: &Inner) -> usize {
    let records = match inner.backend.load_all() {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "wal replay failed; starting from sstables only");
            return 0;
        }
    };

    let count = records.len();
    for rec in records {
        let shard = inner.shard_for(rec.key);
        let mut state = shard.state.write();
        state.bloom.insert(rec.key);
        state.memtable.put(rec.key, rec.value);
    }
    count
}

/// Flushes every shard's replayed state into a fresh L1 checkpoint run and
/// truncates the WAL.
///
/// The logical record set per shard is the union of its learned indexes
/// (oldest to newest) and a full memtable scan, memtable winning. Shards
/// with nothing to persist are skipped; the WAL is truncated only if at
/// least one shard was checkpointed.
pub(crate) fn startup_checkpoint(inner: &Inner) -> anyhow::Result<()> {
    let mut checkpointed = 0usize;

    for shard in &inner.shards {
        let mut latest: HashMap<i64, Vec<u8>> = HashMap::new();
        {
            let state = shard.state.read();
            for li in &state.learned {
                for rec in li.records() {
                    latest.insert(rec.key, rec.value.clone());
                }
            }
            for (key, value) in state.memtable.scan(i64::MIN, i64::MAX) {
                latest.insert(key, value);
            }
        }
        if latest.is_empty() {
            continue;
        }

        let mut records: Vec<Record> = latest
            .into_iter()
            .map(|(key, value)| Record::new(key, value))
            .collect();
        records.sort_by_key(|r| r.key);

        let file_name = format!("shard-{}-l1-{}-checkpoint.sst", shard.id, now_nanos());
        let path = inner.dir.join(&file_name);
        let mut builder = sstable::Builder::create(&path)?;
        for rec in &records {
            builder.add(rec.key, &rec.value)?;
        }
        builder.finish()?;
        let table = Arc::new(Table::open(&path)?);

        let index = Arc::new(learned::LearnedIndex::build(records));
        {
            let mut state = shard.state.write();
            state.l1.push(table);
            state.rebuild_table_view();
            state.learned = vec![Arc::clone(&index)];
            state.memtable = memtable::Memtable::new();
        }
        learned_store::persist_learned_index(inner, shard.id, &index);
        checkpointed += 1;
    }

    if checkpointed == 0 {
        return Ok(());
    }

    inner.backend.truncate()?;
    info!(shards = checkpointed, "startup checkpoint complete, wal truncated");
    Ok(())
}
