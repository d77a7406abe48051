//! Bounded FIFO queue between the capture thread and the analyzer thread.
//!
//! `push` makes the drop-or-allocate decision before copying any bytes: a
//! full queue is detected under the lock and the caller's bytes are never
//! copied into an owned `Frame` when the queue is full. `pop` blocks on the
//! queue's not-empty condition until either an entry is available or the
//! pipeline is stopping with an empty queue (in which case it returns
//! `None`).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::SystemTime;

use tracing::warn;

use crate::config;
use crate::decode::Frame;

struct Inner {
    entries: VecDeque<Frame>,
    high_water_mark: usize,
}

pub struct CaptureQueue {
    capacity: usize,
    inner: Mutex<Inner>,
    not_empty: Condvar,
    dropped_queue_full: AtomicU64,
}

impl CaptureQueue {
    pub fn new(capacity: usize) -> Self {
        CaptureQueue {
            capacity,
            inner: Mutex::new(Inner {
                entries: VecDeque::new(),
                high_water_mark: 0,
            }),
            not_empty: Condvar::new(),
            dropped_queue_full: AtomicU64::new(0),
        }
    }

    pub fn depth(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn high_water_mark(&self) -> usize {
        self.inner.lock().unwrap().high_water_mark
    }

    pub fn dropped_queue_full(&self) -> u64 {
        self.dropped_queue_full.load(Ordering::Relaxed)
    }

    fn record_drop(&self) {
        let dropped = self.dropped_queue_full.fetch_add(1, Ordering::Relaxed) + 1;
        if dropped % config::DROP_WARN_EVERY == 0 {
            warn!("dropped {dropped} frames due to a full capture queue");
        }
    }

    /// Attempts to enqueue a frame built from `data`. The capacity check
    /// happens under the lock *before* `data` is copied into an owned
    /// `Frame` — a full queue is detected and the push abandoned without
    /// ever allocating for the dropped frame. Returns `false` if the queue
    /// was full.
    pub fn push(&self, wire_len: u32, timestamp: SystemTime, data: &[u8]) -> bool {
        {
            let guard = self.inner.lock().unwrap();
            if guard.entries.len() >= self.capacity {
                drop(guard);
                self.record_drop();
                return false;
            }
        }

        // Capacity looked available; copy the frame outside the lock.
        let frame = Frame::new(data.to_vec(), wire_len, timestamp);

        let mut guard = self.inner.lock().unwrap();
        // Re-check under lock: another producer may have filled it between
        // the optimistic check above and reacquiring the lock.
        if guard.entries.len() >= self.capacity {
            drop(guard);
            self.record_drop();
            return false;
        }
        guard.entries.push_back(frame);
        if guard.entries.len() > guard.high_water_mark {
            guard.high_water_mark = guard.entries.len();
        }
        drop(guard);
        self.not_empty.notify_one();
        true
    }

    /// Blocks until an entry is available, or until `stopping` returns true
    /// and the queue is empty (in which case returns `None`).
    pub fn pop(&self, stopping: impl Fn() -> bool) -> Option<Frame> {
        let mut guard = self.inner.lock().unwrap();
        loop {
            if let Some(frame) = guard.entries.pop_front() {
                return Some(frame);
            }
            if stopping() {
                return None;
            }
            let (g, _timeout) = self
                .not_empty
                .wait_timeout(guard, std::time::Duration::from_millis(200))
                .unwrap();
            guard = g;
        }
    }

    /// Wakes any thread blocked in `pop`, so shutdown is observed promptly
    /// instead of waiting out the poll timeout.
    pub fn notify_shutdown(&self) {
        self.not_empty.notify_all();
    }
}
