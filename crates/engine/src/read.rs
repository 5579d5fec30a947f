//! Read path: `get()`, `scan()`, and the spatial `scan_box()`.
//!
//! Point lookups walk the layers newest-first and stop at the first hit; a
//! tombstone at any layer means the key is absent everywhere below it.
//! Range scans instead merge oldest-first into a map, so the *last* writer
//! for each key wins, then drop tombstones and return sorted results.

use std::collections::BTreeMap;

use crate::record::{is_tombstone, Record};
use crate::spatial;
use crate::Store;

impl Store {
    /// Looks up the current value for `key`, or `None` if the key was never
    /// written, was deleted, or the engine is closed.
    ///
    /// Layer order: bloom filter (negative = definitively absent), then
    /// memtable, learned indexes (newest first), L0 (newest first), L1
    /// (newest first), and finally the backend's point read. A zero-length
    /// value found at any layer is a tombstone and hides older layers.
    #[must_use]
    pub fn get(&self, key: i64) -> Option<Vec<u8>> {
        let inner = &self.inner;
        if !inner.is_running() {
            return None;
        }
        inner.stats.record_read();

        let shard = inner.shard_for(key);
        let state = shard.state.read();

        if !state.bloom.may_contain(key) {
            return None;
        }

        if let Some(value) = state.memtable.get(key) {
            if is_tombstone(&value) {
                return None;
            }
            inner.stats.record_hit();
            return Some(value);
        }

        for li in state.learned.iter().rev() {
            if let Some(value) = li.get(key) {
                if is_tombstone(value) {
                    return None;
                }
                return Some(value.to_vec());
            }
        }

        for table in state.tables.iter().rev() {
            if let Some(value) = table.get(key) {
                if is_tombstone(&value) {
                    return None;
                }
                return Some(value);
            }
        }

        // Log-structured backends have no point reads; this reports absent.
        inner.backend.read(key)
    }

    /// Returns every live record with a key in `[lo, hi]`, ascending.
    ///
    /// Per shard, layers merge oldest-to-newest — L1 in compaction order,
    /// L0 in flush order, learned indexes, then the memtable — into a map
    /// where the newest layer overrides older ones. Tombstones are dropped
    /// after the merge so a deletion in any newer layer wins.
    #[must_use]
    pub fn scan(&self, lo: i64, hi: i64) -> Vec<Record> {
        let inner = &self.inner;
        if !inner.is_running() || lo > hi {
            return Vec::new();
        }

        let mut merged: BTreeMap<i64, Vec<u8>> = BTreeMap::new();

        for shard in &inner.shards {
            let state = shard.state.read();

            // The table view is L1 (oldest..newest) then L0 (oldest..newest).
            for table in &state.tables {
                let iter = match table.iter() {
                    Ok(it) => it,
                    Err(_) => continue, // damaged table: skip, keys degrade to absent
                };
                for (key, value) in iter {
                    if key > hi {
                        break;
                    }
                    if key >= lo {
                        merged.insert(key, value);
                    }
                }
            }

            for li in &state.learned {
                for rec in li.scan(lo, hi) {
                    merged.insert(rec.key, rec.value);
                }
            }

            for (key, value) in state.memtable.scan(lo, hi) {
                merged.insert(key, value);
            }
        }

        merged
            .into_iter()
            .filter(|(_, value)| !is_tombstone(value))
            .map(|(key, value)| Record::new(key, value))
            .collect()
    }

    /// Returns every live record whose decoded 3-D coordinate lies inside
    /// the inclusive bounding box.
    ///
    /// The box is decomposed into a set of disjoint Z-order key ranges;
    /// each range is scanned, and results are filtered by re-decoding the
    /// key — the ranges may cover space outside the box.
    #[must_use]
    pub fn scan_box(
        &self,
        min_x: u32,
        min_y: u32,
        min_z: u32,
        max_x: u32,
        max_y: u32,
        max_z: u32,
    ) -> Vec<Record> {
        let ranges = match spatial::z_ranges((min_x, min_y, min_z), (max_x, max_y, max_z)) {
            Ok(r) => r,
            Err(_) => return Vec::new(),
        };

        let mut results = Vec::new();
        for (lo, hi) in ranges {
            for rec in self.scan(lo, hi) {
                if spatial::in_box(rec.key, (min_x, min_y, min_z), (max_x, max_y, max_z)) {
                    results.push(rec);
                }
            }
        }
        results
    }
}
