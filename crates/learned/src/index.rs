use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rand::Rng;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::time::Instant;

use thiserror::Error;

use crate::rmi::RmiModel;

/// "LOOMLIX1" — identifies a persisted learned index.
const INDEX_MAGIC: u64 = 0x4C4F_4F4D_4C49_5831;
const INDEX_VERSION: u32 = 1;

/// Allocation caps applied while loading: anything larger is corruption.
const MAX_RECORDS: u64 = 1 << 32;
const MAX_VALUE_BYTES: u32 = 64 * 1024 * 1024;
const MAX_FANOUT: u32 = 1 << 20;

/// Second-layer bucket count used for freshly built indexes.
const DEFAULT_FANOUT: usize = 1000;

/// Below this window width a linear scan beats binary search.
const LINEAR_SCAN_WIDTH: i64 = 16;

/// One key-value record held by a learned index.
///
/// A zero-length value is a tombstone: the key is known and deleted, and the
/// index reports it like any other record so deletions keep shadowing older
/// storage layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: i64,
    pub value: Vec<u8>,
}

impl Record {
    pub fn new(key: i64, value: Vec<u8>) -> Self {
        Self { key, value }
    }

    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.value.is_empty()
    }
}

/// One sampled point from [`LearnedIndex::export_diagnostics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticPoint {
    pub key: i64,
    pub real_pos: usize,
    pub predicted_pos: i64,
    pub error: i64,
}

/// Errors from persisting or restoring a learned index.
#[derive(Debug, Error)]
pub enum LearnedError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The file is not a learned index, or its structure is damaged.
    #[error("corrupt learned index: {0}")]
    Corrupt(&'static str),
}

/// A sorted record array with a two-layer RMI and observed error bounds.
///
/// The model predicts an approximate position for a key; the recorded
/// `(min_error, max_error)` over the training set turn that prediction into
/// a window guaranteed to contain the key if it is present. Lookups then
/// finish with a short scan or binary search inside the window — see
/// [`get`](LearnedIndex::get).
#[derive(Debug, Clone, PartialEq)]
pub struct LearnedIndex {
    records: Vec<Record>,
    model: RmiModel,
    min_error: i64,
    max_error: i64,
}

impl LearnedIndex {
    /// Builds an index over `records`. The input is sorted by key here; the
    /// caller is responsible for deduplication.
    pub fn build(mut records: Vec<Record>) -> Self {
        records.sort_by_key(|r| r.key);

        let keys: Vec<i64> = records.iter().map(|r| r.key).collect();
        let mut model = RmiModel::new(DEFAULT_FANOUT);
        model.train(&keys);

        let (min_error, max_error) = observed_error_bounds(&model, &keys, 0);

        Self {
            records,
            model,
            min_error,
            max_error,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The full sorted record set. Used when a newer layer folds this index
    /// into a checkpoint.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Point lookup.
    ///
    /// 1. Predict a position and clamp `[p + min_error, p + max_error]` into
    ///    the array bounds.
    /// 2. An empty window means absent.
    /// 3. Narrow windows are scanned linearly; wider ones binary-searched.
    ///
    /// Tombstones are returned as empty slices; interpretation is the
    /// caller's job.
    #[must_use]
    pub fn get(&self, key: i64) -> Option<&[u8]> {
        if self.records.is_empty() {
            return None;
        }

        let predicted = self.model.predict(key);
        let last = self.records.len() as i64 - 1;
        let low = predicted.saturating_add(self.min_error).clamp(0, last);
        let high = predicted.saturating_add(self.max_error).clamp(0, last);
        if low > high {
            return None;
        }

        let (low, high) = (low as usize, high as usize);
        if (high - low) < LINEAR_SCAN_WIDTH as usize {
            for rec in &self.records[low..=high] {
                if rec.key == key {
                    return Some(&rec.value);
                }
                if rec.key > key {
                    return None;
                }
            }
            return None;
        }

        let window = &self.records[low..=high];
        let idx = window.partition_point(|r| r.key < key);
        match window.get(idx) {
            Some(rec) if rec.key == key => Some(&rec.value),
            _ => None,
        }
    }

    /// Appends records to the sorted tail and refits incrementally.
    ///
    /// Each affected bucket model is extended with the new keys' global
    /// positions, then the error bounds are widened for those keys only.
    ///
    /// # Panics
    ///
    /// The appended records must already be sorted and every key must be ≥
    /// the current maximum — anything else is a programmer error.
    pub fn append(&mut self, new_records: Vec<Record>) {
        if new_records.is_empty() {
            return;
        }
        if let (Some(last), Some(first)) = (self.records.last(), new_records.first()) {
            assert!(
                first.key >= last.key,
                "learned index append out of order: {} < {}",
                first.key,
                last.key
            );
        }

        let start = self.records.len();
        self.records.extend(new_records);

        for pos in start..self.records.len() {
            let key = self.records[pos].key;
            self.model.update(key, pos);
        }

        for pos in start..self.records.len() {
            let key = self.records[pos].key;
            let err = pos as i64 - self.model.predict(key);
            self.min_error = self.min_error.min(err);
            self.max_error = self.max_error.max(err);
        }
    }

    /// Returns all records with keys in `[lo, hi]`, ascending.
    ///
    /// Seeds the walk from the model's prediction for `lo`, corrects to the
    /// first record with `key >= lo`, then emits until `key > hi`.
    #[must_use]
    pub fn scan(&self, lo: i64, hi: i64) -> Vec<Record> {
        let mut out = Vec::new();
        if self.records.is_empty() || lo > hi {
            return out;
        }

        let last = self.records.len() - 1;
        let seeded = self
            .model
            .predict(lo)
            .saturating_add(self.min_error)
            .clamp(0, last as i64);
        let mut idx = seeded as usize;

        while idx > 0 && self.records[idx].key >= lo {
            idx -= 1;
        }
        while idx < self.records.len() && self.records[idx].key < lo {
            idx += 1;
        }

        for rec in &self.records[idx..] {
            if rec.key > hi {
                break;
            }
            out.push(rec.clone());
        }
        out
    }

    /// Samples `(key, real, predicted, error)` tuples for visualization,
    /// capped at roughly 5000 points.
    #[must_use]
    pub fn export_diagnostics(&self) -> Vec<DiagnosticPoint> {
        const CAP: usize = 5000;
        let step = (self.records.len() / CAP).max(1);

        let mut points = Vec::with_capacity(self.records.len().div_ceil(step));
        for (pos, rec) in self.records.iter().enumerate().step_by(step) {
            let predicted = self.model.predict(rec.key);
            points.push(DiagnosticPoint {
                key: rec.key,
                real_pos: pos,
                predicted_pos: predicted,
                error: pos as i64 - predicted,
            });
        }
        points
    }

    /// Times `iterations` random point lookups via plain binary search and
    /// via the learned path, returning `(avg_ns_binary, avg_ns_learned)`.
    #[must_use]
    pub fn benchmark_internal(&self, iterations: usize) -> (f64, f64) {
        if self.records.is_empty() || iterations == 0 {
            return (0.0, 0.0);
        }

        let mut rng = rand::thread_rng();
        let keys: Vec<i64> = (0..iterations)
            .map(|_| self.records[rng.gen_range(0..self.records.len())].key)
            .collect();

        let start = Instant::now();
        for &key in &keys {
            let _ = self.records.partition_point(|r| r.key < key);
        }
        let avg_binary = start.elapsed().as_nanos() as f64 / iterations as f64;

        let start = Instant::now();
        for &key in &keys {
            let _ = self.get(key);
        }
        let avg_learned = start.elapsed().as_nanos() as f64 / iterations as f64;

        (avg_binary, avg_learned)
    }

    /// Serializes the index to `path`.
    ///
    /// Layout (all little-endian):
    ///
    /// ```text
    /// [magic: u64][version: u32]
    /// [min_error: i64][max_error: i64]
    /// [record_count: u64] then per record: [key: i64][val_len: u32][value]
    /// [global_min: i64][global_max: i64][fanout: u32]
    /// then per bucket: 7 × f64 (slope, intercept, n, Σx, Σy, Σxy, Σx²)
    /// ```
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), LearnedError> {
        let file = File::create(path)?;
        let mut w = BufWriter::new(file);

        w.write_u64::<LittleEndian>(INDEX_MAGIC)?;
        w.write_u32::<LittleEndian>(INDEX_VERSION)?;
        w.write_i64::<LittleEndian>(self.min_error)?;
        w.write_i64::<LittleEndian>(self.max_error)?;

        w.write_u64::<LittleEndian>(self.records.len() as u64)?;
        for rec in &self.records {
            w.write_i64::<LittleEndian>(rec.key)?;
            w.write_u32::<LittleEndian>(rec.value.len() as u32)?;
            w.write_all(&rec.value)?;
        }

        w.write_i64::<LittleEndian>(self.model.global_min)?;
        w.write_i64::<LittleEndian>(self.model.global_max)?;
        w.write_u32::<LittleEndian>(self.model.fanout() as u32)?;
        for bucket in &self.model.buckets {
            w.write_f64::<LittleEndian>(bucket.slope)?;
            w.write_f64::<LittleEndian>(bucket.intercept)?;
            w.write_f64::<LittleEndian>(bucket.n)?;
            w.write_f64::<LittleEndian>(bucket.sum_x)?;
            w.write_f64::<LittleEndian>(bucket.sum_y)?;
            w.write_f64::<LittleEndian>(bucket.sum_xy)?;
            w.write_f64::<LittleEndian>(bucket.sum_xx)?;
        }

        w.flush()?;
        w.get_ref().sync_all()?;
        Ok(())
    }

    /// Restores an index saved with [`save`](LearnedIndex::save).
    ///
    /// Every structural assumption is validated; a damaged or foreign file
    /// yields [`LearnedError::Corrupt`], never a panic.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LearnedError> {
        let file = File::open(path)?;
        let mut r = BufReader::new(file);

        if r.read_u64::<LittleEndian>()? != INDEX_MAGIC {
            return Err(LearnedError::Corrupt("bad magic"));
        }
        if r.read_u32::<LittleEndian>()? != INDEX_VERSION {
            return Err(LearnedError::Corrupt("unsupported version"));
        }

        let min_error = r.read_i64::<LittleEndian>()?;
        let max_error = r.read_i64::<LittleEndian>()?;

        let count = r.read_u64::<LittleEndian>()?;
        if count > MAX_RECORDS {
            return Err(LearnedError::Corrupt("implausible record count"));
        }

        let mut records = Vec::with_capacity(count as usize);
        let mut prev_key: Option<i64> = None;
        for _ in 0..count {
            let key = r.read_i64::<LittleEndian>()?;
            if let Some(prev) = prev_key {
                if key < prev {
                    return Err(LearnedError::Corrupt("records out of order"));
                }
            }
            prev_key = Some(key);

            let val_len = r.read_u32::<LittleEndian>()?;
            if val_len > MAX_VALUE_BYTES {
                return Err(LearnedError::Corrupt("implausible value length"));
            }
            let mut value = vec![0u8; val_len as usize];
            r.read_exact(&mut value)?;
            records.push(Record { key, value });
        }

        let global_min = r.read_i64::<LittleEndian>()?;
        let global_max = r.read_i64::<LittleEndian>()?;
        let fanout = r.read_u32::<LittleEndian>()?;
        if fanout == 0 || fanout > MAX_FANOUT {
            return Err(LearnedError::Corrupt("implausible fanout"));
        }

        let mut model = RmiModel::new(fanout as usize);
        model.global_min = global_min;
        model.global_max = global_max;
        for bucket in model.buckets.iter_mut() {
            bucket.slope = r.read_f64::<LittleEndian>()?;
            bucket.intercept = r.read_f64::<LittleEndian>()?;
            bucket.n = r.read_f64::<LittleEndian>()?;
            bucket.sum_x = r.read_f64::<LittleEndian>()?;
            bucket.sum_y = r.read_f64::<LittleEndian>()?;
            bucket.sum_xy = r.read_f64::<LittleEndian>()?;
            bucket.sum_xx = r.read_f64::<LittleEndian>()?;
        }

        Ok(Self {
            records,
            model,
            min_error,
            max_error,
        })
    }
}

/// Walks `keys` and records the extreme deviations `pos - predict(key)`,
/// starting from position `offset`. Bounds start at zero like the fit did.
fn observed_error_bounds(model: &RmiModel, keys: &[i64], offset: usize) -> (i64, i64) {
    let mut min_error = 0i64;
    let mut max_error = 0i64;
    for (i, &key) in keys.iter().enumerate() {
        let err = (offset + i) as i64 - model.predict(key);
        min_error = min_error.min(err);
        max_error = max_error.max(err);
    }
    (min_error, max_error)
}
