//! # Engine — the LoomKV storage engine
//!
//! A sharded LSM-tree key-value store over `i64` keys with a learned index
//! (two-layer RMI) per shard, rebuilt after every compaction to accelerate
//! point lookups over the merged data.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌────────────────────────────────────────────────────────────┐
//! │                          STORE                             │
//! │                                                            │
//! │ put ──► WAL queue ──► writer thread ──► wal (batch+sync)   │
//! │   └───► shard[key mod N] write lock:                       │
//! │            bloom insert, memtable insert                   │
//! │               | (flush threshold?)                         │
//! │               v                                            │
//! │            flush ──► new L0 SSTable                        │
//! │               | (L0 count >= trigger?)                     │
//! │               v                                            │
//! │            compaction thread ──► merged L1 SSTable         │
//! │                              └─► learned index rebuilt     │
//! │                                  and persisted (.li)       │
//! │                                                            │
//! │ get ──► bloom ─► memtable ─► learned ─► L0 ─► L1           │
//! │          (negative = absent)   (newest first, tombstones   │
//! │                                 shadow older layers)       │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module          | Purpose                                              |
//! |-----------------|------------------------------------------------------|
//! | `lib.rs`        | `Store` struct, constructor, lifecycle, `close()`    |
//! | [`config`]      | TOML-loadable configuration with defaults            |
//! | [`record`]      | Key/value/tombstone model                            |
//! | [`backend`]     | Durability capability trait + WAL implementation     |
//! | `queue`         | Bounded record queue feeding the writer thread       |
//! | `writer`        | Background WAL batching (batch size + 100 ms tick)   |
//! | `shard`         | Per-shard state behind a reader-writer lock          |
//! | `write`         | `put()`, `delete()`, memtable flush to L0            |
//! | `read`          | `get()`, `scan()`, `scan_box()`                      |
//! | `compaction`    | L0 -> L1 merge with newest-wins dedup                |
//! | `learned_store` | Learned index rebuild, signatures, `.li` persistence |
//! | `recovery`      | SSTable restore, WAL replay, startup checkpoint      |
//! | [`spatial`]     | 3-D Morton keys and bounding-box range decomposition |
//! | `admin`         | Stats snapshot, reset, model diagnostics             |
//!
//! ## Crash Safety
//!
//! Writes reach the memtable synchronously and the WAL asynchronously (in
//! batches); the window between `put` returning and the next batch sync is
//! an acknowledged durability gap. On startup the WAL is replayed, the
//! replayed state is checkpointed into L1 SSTables, and only then is the
//! WAL truncated. SSTables are written to a temp file and renamed into
//! place, so a crash never leaves a half-written run behind.

mod admin;
mod backend;
pub mod config;
mod compaction;
mod learned_store;
mod queue;
mod read;
pub mod record;
mod recovery;
mod shard;
pub mod spatial;
mod stats;
mod write;
mod writer;

pub use backend::{Backend, WalBackend};
pub use config::Config;
pub use learned::DiagnosticPoint;
pub use record::{is_tombstone, Key, Record, Value};
pub use stats::{StatsSnapshot, WorkloadStats};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use queue::WalQueue;
use shard::Shard;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Name of the single WAL file inside the data directory.
pub const WAL_FILENAME: &str = "loom.db.wal";

/// A flush is skipped entirely below this many resident records.
pub(crate) const MIN_FLUSH_RECORDS: usize = 100;

// Lifecycle states.
const RUNNING: u8 = 0;
const DRAINING: u8 = 1;
const CLOSED: u8 = 2;

pub(crate) struct Inner {
    pub(crate) shards: Vec<Arc<Shard>>,
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) queue: Arc<WalQueue>,
    pub(crate) stats: WorkloadStats,
    pub(crate) config: Config,
    pub(crate) dir: PathBuf,
    lifecycle: AtomicU8,
}

impl Inner {
    pub(crate) fn shard_for(&self, key: i64) -> &Arc<Shard> {
        let n = self.shards.len() as i64;
        &self.shards[key.rem_euclid(n) as usize]
    }

    pub(crate) fn is_running(&self) -> bool {
        self.lifecycle.load(Ordering::Acquire) == RUNNING
    }
}

/// The storage engine.
///
/// Thread-safe: all operations take `&self`, and a `Store` can be shared
/// across threads behind an `Arc`. Dropping the store performs a clean
/// [`close`](Store::close).
pub struct Store {
    inner: Arc<Inner>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl Store {
    /// Opens (or creates) an engine rooted at `config.storage.path`.
    ///
    /// Recovery steps, in order:
    ///
    /// 1. Create the data directory (failure here is fatal).
    /// 2. Remove leftover `.sst.tmp` files from interrupted flushes.
    /// 3. Restore L0/L1 SSTables from disk, re-populating bloom filters.
    /// 4. Restore persisted learned indexes (signature match) or rebuild.
    /// 5. Replay the WAL into shard memtables.
    /// 6. If anything was replayed, checkpoint every non-empty shard into
    ///    L1 and truncate the WAL.
    /// 7. Spawn the WAL writer thread.
    ///
    /// Restoration failures other than directory creation are logged and
    /// skipped — a damaged table costs its contents, not startup.
    pub fn open(mut config: Config) -> Result<Self> {
        config.apply_defaults();
        let dir = config.storage.path.clone();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create data dir {}", dir.display()))?;

        let backend: Arc<dyn Backend> = Arc::new(WalBackend::open(dir.join(WAL_FILENAME))?);
        let queue = Arc::new(WalQueue::new(config.storage.wal_buffer_size));

        let shards = (0..config.system.shard_count)
            .map(|id| {
                Arc::new(Shard::new(
                    id,
                    config.system.bloom_size,
                    config.system.bloom_false_prob,
                ))
            })
            .collect();

        let inner = Arc::new(Inner {
            shards,
            backend,
            queue,
            stats: WorkloadStats::new(),
            config,
            dir,
            lifecycle: AtomicU8::new(RUNNING),
        });

        recovery::cleanup_tmp_files(&inner.dir);
        recovery::restore_tables(&inner);
        recovery::restore_learned_indexes(&inner);

        let replayed = recovery::replay_wal(&inner);
        if replayed > 0 {
            info!(replayed, "wal replay complete, checkpointing");
            if let Err(e) = recovery::startup_checkpoint(&inner) {
                // The WAL stays untouched; the next restart retries.
                warn!(error = %e, "startup checkpoint failed");
            }
        }

        let writer = writer::spawn(
            Arc::clone(&inner.queue),
            Arc::clone(&inner.backend),
            inner.config.storage.wal_batch_size,
        );

        Ok(Self {
            inner,
            writer: Mutex::new(Some(writer)),
        })
    }

    /// The effective configuration (after defaults were applied).
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Drains the WAL queue, stops the writer thread, flushes the log, and
    /// releases every SSTable handle. Idempotent; operations after close
    /// are no-ops that report absent.
    pub fn close(&self) -> Result<()> {
        if self
            .inner
            .lifecycle
            .compare_exchange(RUNNING, DRAINING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        self.inner.queue.close();
        if let Some(handle) = self.writer.lock().take() {
            if handle.join().is_err() {
                warn!("wal writer thread panicked during shutdown");
            }
        }
        self.inner.backend.close()?;

        for shard in &self.inner.shards {
            let mut state = shard.state.write();
            state.l0.clear();
            state.l1.clear();
            state.tables.clear();
        }

        self.inner.lifecycle.store(CLOSED, Ordering::Release);
        Ok(())
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "close during drop failed");
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("dir", &self.inner.dir)
            .field("shards", &self.inner.shards.len())
            .finish()
    }
}

/// Nanoseconds since the epoch; used to stamp SSTable filenames.
pub(crate) fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests;
