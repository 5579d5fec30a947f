use anyhow::{bail, Result};
use byteorder::{LittleEndian, WriteBytesExt};
use std::fs::{rename, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::format::{write_footer, INDEX_SAMPLE_RATE};

/// Streams records into a new SSTable file.
///
/// Keys must be added in strictly ascending order — the builder rejects
/// out-of-order or duplicate keys, since every downstream reader (binary
/// search over the sparse index, forward scans, merge iterators) depends on
/// that invariant.
///
/// File layout:
///
/// ```text
/// [DATA]   repeated: [key: i64 LE][val_len: u32 LE][value bytes]
/// [INDEX]  [count: u32 LE] then repeated: [key: i64 LE][offset: u64 LE]
/// [FOOTER] [index_start: u64 LE][magic: u64 LE]
/// ```
///
/// One index entry is sampled every [`INDEX_SAMPLE_RATE`] data entries.
///
/// The builder writes to a `.sst.tmp` sibling and atomically renames it into
/// place in [`finish`](Builder::finish), so a crash mid-build never leaves a
/// half-written `.sst` behind.
pub struct Builder {
    writer: BufWriter<std::fs::File>,
    path: PathBuf,
    tmp_path: PathBuf,
    offset: u64,
    count: u64,
    last_key: Option<i64>,
    index_keys: Vec<i64>,
    index_offsets: Vec<u64>,
}

impl Builder {
    /// Creates a builder targeting `path`. The data is staged in a temp file
    /// next to the target.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let tmp_path = path.with_extension("sst.tmp");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
            tmp_path,
            offset: 0,
            count: 0,
            last_key: None,
            index_keys: Vec::new(),
            index_offsets: Vec::new(),
        })
    }

    /// Appends one record. An empty `value` is a tombstone and is written
    /// like any other record.
    ///
    /// # Errors
    ///
    /// Fails if `key` is not strictly greater than the previous key, or on
    /// I/O failure.
    pub fn add(&mut self, key: i64, value: &[u8]) -> Result<()> {
        if let Some(last) = self.last_key {
            if key <= last {
                bail!("sstable builder: key {} not above previous key {}", key, last);
            }
        }

        if self.count % INDEX_SAMPLE_RATE == 0 {
            self.index_keys.push(key);
            self.index_offsets.push(self.offset);
        }

        self.writer.write_i64::<LittleEndian>(key)?;
        self.writer.write_u32::<LittleEndian>(value.len() as u32)?;
        self.writer.write_all(value)?;

        self.offset += 8 + 4 + value.len() as u64;
        self.count += 1;
        self.last_key = Some(key);
        Ok(())
    }

    /// Number of records added so far.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Writes the sparse index and footer, fsyncs, and moves the file into
    /// place. Consumes the builder.
    pub fn finish(mut self) -> Result<()> {
        let index_start = self.offset;

        self.writer
            .write_u32::<LittleEndian>(self.index_keys.len() as u32)?;
        for (key, off) in self.index_keys.iter().zip(&self.index_offsets) {
            self.writer.write_i64::<LittleEndian>(*key)?;
            self.writer.write_u64::<LittleEndian>(*off)?;
        }
        write_footer(&mut self.writer, index_start)?;

        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        rename(&self.tmp_path, &self.path)?;
        Ok(())
    }

    /// Abandons the build and removes the temp file.
    pub fn abort(self) {
        drop(self.writer);
        let _ = std::fs::remove_file(&self.tmp_path);
    }
}
