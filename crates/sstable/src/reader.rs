use anyhow::{bail, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::format::{footer_pos, read_footer, FOOTER_BYTES, SSTABLE_MAGIC};

/// Maximum value size we'll allocate during reads (64 MiB). Prevents OOM on
/// corrupt files.
const MAX_VALUE_BYTES: u32 = 64 * 1024 * 1024;

/// Reads an SSTable file for point lookups and scans.
///
/// On [`open`](Table::open) the 16-byte footer is validated and the sparse
/// index (one `(key, offset)` per [`crate::format::INDEX_SAMPLE_RATE`]
/// entries) is loaded into memory. A persistent file handle is kept for
/// `get`, wrapped in a `Mutex` so lookups work through a shared `&self`.
///
/// [`iter`](Table::iter) opens an independent handle, so full scans never
/// contend with point lookups.
pub struct Table {
    path: PathBuf,
    file_size: u64,
    index_start: u64,
    index_keys: Vec<i64>,
    index_offsets: Vec<u64>,
    file: Mutex<BufReader<File>>,
}

impl Table {
    /// Opens an SSTable, validating the footer magic and loading the sparse
    /// index.
    ///
    /// # Errors
    ///
    /// Fails if the file is shorter than a footer, the magic does not match,
    /// the index offset points outside the file, or any read fails.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut f = File::open(&path)?;
        let file_size = f.metadata()?.len();

        if file_size < FOOTER_BYTES {
            bail!("sstable {}: file too small", path.display());
        }

        let (index_start, magic) = read_footer(&mut f)?;
        if magic != SSTABLE_MAGIC {
            bail!("sstable {}: invalid magic number", path.display());
        }
        if index_start >= footer_pos(file_size) {
            bail!("sstable {}: index offset out of bounds", path.display());
        }

        f.seek(SeekFrom::Start(index_start))?;
        let count = f.read_u32::<LittleEndian>()? as usize;

        let mut index_keys = Vec::with_capacity(count);
        let mut index_offsets = Vec::with_capacity(count);
        for _ in 0..count {
            index_keys.push(f.read_i64::<LittleEndian>()?);
            index_offsets.push(f.read_u64::<LittleEndian>()?);
        }

        f.seek(SeekFrom::Start(0))?;
        Ok(Self {
            path,
            file_size,
            index_start,
            index_keys,
            index_offsets,
            file: Mutex::new(BufReader::new(f)),
        })
    }

    /// Path of the underlying `.sst` file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// On-disk size in bytes.
    #[must_use]
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Point lookup.
    ///
    /// Binary-searches the sparse index for the greatest sampled key ≤
    /// `key`, seeks there, and scans forward until a match, a greater key,
    /// or the end of the data region. Tombstones are returned as the empty
    /// value — interpreting them is the caller's job.
    ///
    /// Per-entry read failures terminate the scan as "absent" rather than
    /// propagate: a damaged table can hide keys but never fails a read path.
    pub fn get(&self, key: i64) -> Option<Vec<u8>> {
        if self.index_keys.is_empty() || key < self.index_keys[0] {
            return None;
        }

        // Greatest sampled key <= target.
        let slot = self.index_keys.partition_point(|&k| k <= key) - 1;
        let offset = self.index_offsets[slot];

        let mut f = self.file.lock();
        if f.seek(SeekFrom::Start(offset)).is_err() {
            return None;
        }

        let mut pos = offset;
        while pos < self.index_start {
            let entry_key = f.read_i64::<LittleEndian>().ok()?;
            let val_len = f.read_u32::<LittleEndian>().ok()?;
            if val_len > MAX_VALUE_BYTES {
                return None;
            }

            if entry_key == key {
                let mut value = vec![0u8; val_len as usize];
                f.read_exact(&mut value).ok()?;
                return Some(value);
            }
            if entry_key > key {
                return None;
            }

            f.seek_relative(val_len as i64).ok()?;
            pos += 8 + 4 + val_len as u64;
        }
        None
    }

    /// Returns an iterator over all entries in ascending key order.
    ///
    /// Opens a fresh file handle, independent of `get`.
    pub fn iter(&self) -> Result<TableIter> {
        let file = File::open(&self.path)?;
        Ok(TableIter {
            reader: BufReader::new(file),
            pos: 0,
            data_end: self.index_start,
        })
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("path", &self.path)
            .field("file_size", &self.file_size)
            .field("index_entries", &self.index_keys.len())
            .finish()
    }
}

/// Sequential reader over one SSTable's data region.
///
/// Yields `(key, value)` in ascending order. Any read error or framing
/// problem ends iteration early — a torn table produces a short stream, not
/// a panic.
pub struct TableIter {
    reader: BufReader<File>,
    pos: u64,
    data_end: u64,
}

impl Iterator for TableIter {
    type Item = (i64, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.data_end {
            return None;
        }
        let key = self.reader.read_i64::<LittleEndian>().ok()?;
        let val_len = self.reader.read_u32::<LittleEndian>().ok()?;
        if val_len > MAX_VALUE_BYTES {
            self.pos = self.data_end;
            return None;
        }
        let mut value = vec![0u8; val_len as usize];
        self.reader.read_exact(&mut value).ok()?;
        self.pos += 8 + 4 + val_len as u64;
        Some((key, value))
    }
}
