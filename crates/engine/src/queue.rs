//! Bounded queue feeding the background WAL writer.
//!
//! Producers ([`crate::Store::put`]) enqueue records without blocking when
//! there is room, and fall back to a blocking enqueue under back-pressure —
//! the caller delays briefly instead of the queue growing without bound.
//! The single consumer (the writer thread) drains records in batches with a
//! flush tick, so one fsync covers many records.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::record::Record;

struct QueueState {
    buf: VecDeque<Record>,
    closed: bool,
}

/// A bounded MPSC record queue built on a mutex + two condition variables.
pub struct WalQueue {
    capacity: usize,
    state: Mutex<QueueState>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl WalQueue {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be > 0");
        Self {
            capacity,
            state: Mutex::new(QueueState {
                buf: VecDeque::with_capacity(capacity.min(4096)),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Non-blocking enqueue. A full queue hands the record back so the
    /// caller can fall back to [`push`](WalQueue::push); records offered
    /// after close are silently dropped (the engine is draining).
    pub fn try_push(&self, record: Record) -> Result<(), Record> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }
        if state.buf.len() >= self.capacity {
            return Err(record);
        }
        state.buf.push_back(record);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Blocking enqueue: waits for room. The back-pressure fallback when
    /// [`try_push`](WalQueue::try_push) fails.
    pub fn push(&self, record: Record) {
        let mut state = self.state.lock();
        while state.buf.len() >= self.capacity && !state.closed {
            self.not_full.wait(&mut state);
        }
        if state.closed {
            return;
        }
        state.buf.push_back(record);
        self.not_empty.notify_one();
    }

    /// Consumer side: collects up to `max` records, waiting at most `tick`
    /// for the batch to fill.
    ///
    /// Returns as soon as `max` records are gathered, the tick expires with
    /// at least the records drained so far, or the queue is closed (in which
    /// case whatever remains is drained without waiting).
    pub fn pop_batch(&self, max: usize, tick: Duration) -> Vec<Record> {
        let deadline = Instant::now() + tick;
        let mut out = Vec::new();
        let mut state = self.state.lock();

        loop {
            while out.len() < max {
                match state.buf.pop_front() {
                    Some(rec) => out.push(rec),
                    None => break,
                }
            }
            if !out.is_empty() {
                self.not_full.notify_all();
            }
            if out.len() >= max || state.closed {
                return out;
            }

            let timed_out = self
                .not_empty
                .wait_until(&mut state, deadline)
                .timed_out();
            if timed_out {
                // Tick expired: flush whatever we have (possibly nothing).
                while out.len() < max {
                    match state.buf.pop_front() {
                        Some(rec) => out.push(rec),
                        None => break,
                    }
                }
                if !out.is_empty() {
                    self.not_full.notify_all();
                }
                return out;
            }
        }
    }

    /// Number of records currently queued.
    pub fn len(&self) -> usize {
        self.state.lock().buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().buf.is_empty()
    }

    /// Marks the queue closed and wakes everyone. Producers become no-ops;
    /// the consumer drains the remainder without blocking.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Discards everything currently queued.
    pub fn drain(&self) {
        let mut state = self.state.lock();
        state.buf.clear();
        self.not_full.notify_all();
    }
}
