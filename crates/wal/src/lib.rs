//! # WAL — Write-Ahead Log
//!
//! Crash-recovery log for the LoomKV storage engine.
//!
//! Every mutation (a put or a tombstone) is framed, checksummed, and appended
//! to a single log file. On restart the log is replayed to reconstruct the
//! in-memory state that had not yet reached an SSTable. After a successful
//! startup checkpoint the log is truncated to zero bytes.
//!
//! ## Binary Record Format
//!
//! ```text
//! [crc32: u32 LE][timestamp_ns: u64 LE][key: i64 LE][val_len: u32 LE][value ...]
//! ```
//!
//! The CRC-32 (IEEE) covers everything from `timestamp_ns` through the last
//! value byte. A zero-length value is a tombstone and is replayed as such.
//!
//! ## Torn Tail Tolerance
//!
//! Replay stops at the first framing or CRC error and treats the remainder of
//! the file as a torn tail: all complete records before it are still yielded,
//! and replay reports success. A crash mid-append therefore never poisons
//! recovery.
//!
//! ## Example
//!
//! ```rust,no_run
//! use wal::Wal;
//!
//! let wal = Wal::open("loom.db.wal").unwrap();
//! wal.append(42, b"payload").unwrap();
//! wal.sync().unwrap();
//!
//! let mut n = 0;
//! wal.replay(|_key, _value| n += 1).unwrap();
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher as Crc32;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

use thiserror::Error;

/// Fixed frame header: crc(4) + timestamp(8) + key(8) + val_len(4).
pub const HEADER_BYTES: usize = 4 + 8 + 8 + 4;

/// Safety cap applied while replaying: a value length beyond this is treated
/// as framing corruption, not an allocation request.
const MAX_VALUE_BYTES: u32 = 64 * 1024 * 1024;

/// Errors that can occur during WAL operations.
#[derive(Debug, Error)]
pub enum WalError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Append-only write-ahead log with a buffered writer.
///
/// A single mutex serializes `append`, `sync`, `truncate`, and `size`.
/// Readers ([`Wal::replay`]) open an independent file handle and therefore do
/// not contend with writers; they observe a prefix consistent with the last
/// append completed before the handle was opened.
pub struct Wal {
    path: PathBuf,
    inner: Mutex<WalInner>,
}

struct WalInner {
    writer: BufWriter<File>,
    /// Reusable scratch buffer so `append` does not allocate per record.
    scratch: Vec<u8>,
}

impl Wal {
    /// Opens (or creates) the log file in append mode.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        Ok(Self {
            path,
            inner: Mutex::new(WalInner {
                writer: BufWriter::new(file),
                scratch: Vec::with_capacity(256),
            }),
        })
    }

    /// Appends one framed record.
    ///
    /// Returns once the buffered bytes have been handed to the file. The file
    /// is **not** fsynced here; callers that need durability follow up with
    /// [`Wal::sync`].
    pub fn append(&self, key: i64, value: &[u8]) -> Result<(), WalError> {
        let mut inner = self.inner.lock();
        let WalInner { writer, scratch } = &mut *inner;

        scratch.clear();
        // The 4-byte CRC slot is filled after the body is assembled.
        scratch.extend_from_slice(&[0u8; 4]);

        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        scratch.write_u64::<LittleEndian>(ts)?;
        scratch.write_i64::<LittleEndian>(key)?;
        scratch.write_u32::<LittleEndian>(value.len() as u32)?;
        scratch.extend_from_slice(value);

        let mut hasher = Crc32::new();
        hasher.update(&scratch[4..]);
        let crc = hasher.finalize();
        scratch[0..4].copy_from_slice(&crc.to_le_bytes());

        writer.write_all(scratch)?;
        writer.flush()?;
        Ok(())
    }

    /// Flushes buffered bytes and fsyncs the file.
    pub fn sync(&self) -> Result<(), WalError> {
        let mut inner = self.inner.lock();
        inner.writer.flush()?;
        inner.writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Truncates the log to zero bytes.
    ///
    /// Flushes, swaps in a handle reopened with `TRUNC`, and fsyncs. After
    /// this call `size()` is 0 and `replay` yields nothing.
    pub fn truncate(&self) -> Result<(), WalError> {
        let mut inner = self.inner.lock();
        inner.writer.flush()?;
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        file.sync_all()?;
        inner.writer = BufWriter::new(file);
        Ok(())
    }

    /// Returns the current file size in bytes, after flushing buffers.
    pub fn size(&self) -> Result<u64, WalError> {
        let mut inner = self.inner.lock();
        inner.writer.flush()?;
        Ok(inner.writer.get_ref().metadata()?.len())
    }

    /// Flushes outstanding buffered bytes. Dropping the `Wal` afterwards
    /// releases the file handle.
    pub fn close(&self) -> Result<(), WalError> {
        let mut inner = self.inner.lock();
        inner.writer.flush()?;
        Ok(())
    }

    /// Replays every complete record, calling `apply(key, value)` for each.
    ///
    /// Opens an independent read handle positioned at the start of the file.
    ///
    /// # Termination
    ///
    /// - Clean EOF -> `Ok(())`.
    /// - Truncated tail (partial frame at the end) -> `Ok(())` after yielding
    ///   every complete record before it.
    /// - CRC mismatch or an absurd `val_len` -> logged, then `Ok(())` — the
    ///   remainder is treated as a torn tail.
    /// - I/O error opening or reading the file -> `Err(WalError::Io)`.
    pub fn replay<F>(&self, mut apply: F) -> Result<(), WalError>
    where
        F: FnMut(i64, Vec<u8>),
    {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(WalError::Io(e)),
        };
        let mut rdr = BufReader::new(file);
        let mut header = [0u8; HEADER_BYTES];

        loop {
            match read_exact_or_eof(&mut rdr, &mut header)? {
                ReadOutcome::Eof | ReadOutcome::Partial => return Ok(()),
                ReadOutcome::Full => {}
            }

            let stored_crc = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let key = (&header[12..20]).read_i64::<LittleEndian>()?;
            let val_len = (&header[20..24]).read_u32::<LittleEndian>()?;

            if val_len > MAX_VALUE_BYTES {
                warn!(val_len, "wal: implausible value length, treating as torn tail");
                return Ok(());
            }

            let mut value = vec![0u8; val_len as usize];
            match rdr.read_exact(&mut value) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(WalError::Io(e)),
            }

            let mut hasher = Crc32::new();
            hasher.update(&header[4..]);
            hasher.update(&value);
            if hasher.finalize() != stored_crc {
                warn!("wal: crc mismatch, treating remainder as torn tail");
                return Ok(());
            }

            apply(key, value);
        }
    }
}

enum ReadOutcome {
    Full,
    Partial,
    Eof,
}

/// Reads exactly `buf.len()` bytes, distinguishing clean EOF (zero bytes
/// read) from a partial frame (some bytes, then EOF).
fn read_exact_or_eof<R: Read>(rdr: &mut R, buf: &mut [u8]) -> Result<ReadOutcome, WalError> {
    let mut filled = 0;
    while filled < buf.len() {
        match rdr.read(&mut buf[filled..]) {
            Ok(0) => {
                return Ok(if filled == 0 {
                    ReadOutcome::Eof
                } else {
                    ReadOutcome::Partial
                });
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(WalError::Io(e)),
        }
    }
    Ok(ReadOutcome::Full)
}

#[cfg(test)]
mod tests;
