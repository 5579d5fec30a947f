//! The background WAL writer thread.
//!
//! Drains the record queue in batches: a batch is flushed when it reaches
//! `wal_batch_size` records or when the 100 ms tick fires with records
//! pending, whichever comes first. Each flush appends the batch to the WAL
//! and syncs once.
//!
//! Write errors are logged and the batch is dropped — the records are still
//! readable from the memtable, and the next startup checkpoint rewrites
//! them into L1. On shutdown the queue is drained without blocking before
//! the thread exits.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::error;

use crate::backend::Backend;
use crate::queue::WalQueue;

const FLUSH_TICK: Duration = Duration::from_millis(100);

/// Spawns the writer thread.
pub(crate) fn spawn(
    queue: Arc<WalQueue>,
    backend: Arc<dyn Backend>,
    batch_size: usize,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("loom-wal-writer".into())
        .spawn(move || run(queue, backend, batch_size))
        .expect("failed to spawn wal writer thread")
}

fn run(queue: Arc<WalQueue>, backend: Arc<dyn Backend>, batch_size: usize) {
    let batch_size = if batch_size == 0 { 500 } else { batch_size };

    loop {
        let batch = queue.pop_batch(batch_size, FLUSH_TICK);
        if !batch.is_empty() {
            if let Err(e) = backend.batch_write(&batch) {
                // Not retried: the memtable still holds these records and
                // the next checkpoint makes them durable in L1.
                error!(error = %e, dropped = batch.len(), "wal batch write failed");
            }
        } else if queue.is_closed() {
            // Closed and fully drained.
            return;
        }
    }
}
