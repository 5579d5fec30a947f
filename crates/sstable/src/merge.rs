//! Merge iterator over multiple [`Table`]s.
//!
//! Produces `(key, value)` pairs in ascending key order. When the same key
//! appears in multiple tables, only the entry from the **newest source** is
//! emitted — sources are supplied oldest-first, so on a tie the iterator
//! with the highest source index wins.
//!
//! This is the core primitive for compaction: walk N input SSTables in
//! sorted order, suppress shadowed duplicates, and stream the result into a
//! new table. Tombstones pass through like any other record so that a
//! deletion keeps shadowing older runs.

use anyhow::Result;

use crate::{Table, TableIter};

/// One input stream positioned at its current head entry.
struct Source {
    iter: TableIter,
    head: Option<(i64, Vec<u8>)>,
}

impl Source {
    fn advance(&mut self) {
        self.head = self.iter.next();
    }
}

/// Merges multiple SSTables into a single sorted, deduplicated stream.
///
/// Inputs must be given **oldest first**; newest-wins tie-breaking depends
/// on that order.
pub struct MergeIterator {
    sources: Vec<Source>,
}

impl MergeIterator {
    /// Opens an iterator per table and positions each at its first entry.
    pub fn new(tables: &[&Table]) -> Result<Self> {
        let mut sources = Vec::with_capacity(tables.len());
        for table in tables {
            let mut iter = table.iter()?;
            let head = iter.next();
            sources.push(Source { iter, head });
        }
        Ok(Self { sources })
    }

    /// Returns the next `(key, value)` in ascending order, or `None` when
    /// every source is exhausted.
    pub fn next_entry(&mut self) -> Option<(i64, Vec<u8>)> {
        // Pick the smallest head key; on equal keys, the later (newer)
        // source replaces the earlier one.
        let mut winner: Option<(usize, i64)> = None;
        for (i, src) in self.sources.iter().enumerate() {
            if let Some((key, _)) = src.head {
                match winner {
                    Some((_, best)) if key > best => {}
                    Some((_, best)) if key == best => winner = Some((i, key)),
                    _ => winner = Some((i, key)),
                }
            }
        }

        let (idx, key) = winner?;
        let entry = self.sources[idx].head.take();
        self.sources[idx].advance();

        // Every other source sitting on the same key is shadowed; skip it.
        for (i, src) in self.sources.iter_mut().enumerate() {
            if i == idx {
                continue;
            }
            while matches!(src.head, Some((k, _)) if k == key) {
                src.advance();
            }
        }

        entry
    }

    /// Collects all remaining entries into a `Vec`. Useful for tests.
    pub fn collect_all(&mut self) -> Vec<(i64, Vec<u8>)> {
        let mut out = Vec::new();
        while let Some(pair) = self.next_entry() {
            out.push(pair);
        }
        out
    }
}
