//! The persistence backend behind the write path.
//!
//! The engine only needs a narrow capability set from its durability layer:
//! append records, batch-append with one sync, replay everything at startup,
//! truncate after a checkpoint, and report size. The trait keeps that seam
//! explicit so an alternative log implementation can substitute without any
//! engine changes.

use anyhow::Result;

use crate::record::Record;

/// Capability set the engine requires from its durability layer.
pub trait Backend: Send + Sync {
    /// Appends a single record.
    fn write(&self, key: i64, value: &[u8]) -> Result<()>;

    /// Appends a batch of records, then makes the batch durable with a
    /// single sync.
    fn batch_write(&self, records: &[Record]) -> Result<()>;

    /// Point read. A log-structured backend has no random access; the
    /// WAL-backed implementation always reports absent.
    fn read(&self, key: i64) -> Option<Vec<u8>>;

    /// Replays every persisted record in append order.
    fn load_all(&self) -> Result<Vec<Record>>;

    /// Discards all persisted records. Used after a startup checkpoint and
    /// by `reset`.
    fn truncate(&self) -> Result<()>;

    /// Current size of the persisted log in bytes.
    fn size(&self) -> Result<u64>;

    /// Flushes outstanding state before shutdown.
    fn close(&self) -> Result<()>;
}

/// [`Backend`] implemented over the append-only [`wal::Wal`].
pub struct WalBackend {
    wal: wal::Wal,
}

impl WalBackend {
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        Ok(Self {
            wal: wal::Wal::open(path)?,
        })
    }
}

impl Backend for WalBackend {
    fn write(&self, key: i64, value: &[u8]) -> Result<()> {
        self.wal.append(key, value)?;
        Ok(())
    }

    fn batch_write(&self, records: &[Record]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        for rec in records {
            self.wal.append(rec.key, &rec.value)?;
        }
        self.wal.sync()?;
        Ok(())
    }

    fn read(&self, _key: i64) -> Option<Vec<u8>> {
        // An append-only log cannot answer point reads.
        None
    }

    fn load_all(&self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        self.wal
            .replay(|key, value| records.push(Record::new(key, value)))?;
        Ok(records)
    }

    fn truncate(&self) -> Result<()> {
        self.wal.truncate()?;
        Ok(())
    }

    fn size(&self) -> Result<u64> {
        Ok(self.wal.size()?)
    }

    fn close(&self) -> Result<()> {
        self.wal.close()?;
        Ok(())
    }
}
