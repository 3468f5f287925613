//! Fixed-capacity FIFO hand-off between pipeline stages.
//!
//! `push` blocks while the queue is full, `pop` blocks while it is empty,
//! and both give up as soon as the shared [`CancellationToken`] fires. The
//! queue depth doubles as the back-pressure mechanism and as an observable
//! buffer-health metric, so `len()` must stay cheap.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::cancel::{CancellationToken, Cancelled};

/// Upper bound on how long a waiter sleeps before re-checking cancellation.
///
/// The entropy stage can block indefinitely inside a kernel read, so queue
/// waiters must wake on their own to observe a cancel that nobody signals.
const WAIT_SLICE: Duration = Duration::from_millis(100);

/// Bounded, thread-safe FIFO with cancellation-aware blocking.
pub struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
    token: CancellationToken,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items.
    ///
    /// # Panics
    /// Panics if `capacity` is zero; a zero-capacity hand-off can never
    /// make progress.
    pub fn new(capacity: usize, token: CancellationToken) -> Self {
        assert!(capacity >= 1, "queue capacity must be at least 1");
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
            token,
        }
    }

    /// Append `item`, blocking while the queue is full.
    ///
    /// Returns `Err(Cancelled)` without enqueuing once the token fires; a
    /// cancelled queue rejects all further pushes immediately.
    pub fn push(&self, item: T) -> Result<(), Cancelled> {
        let mut items = self.items.lock().unwrap();
        loop {
            if self.token.is_cancelled() {
                return Err(Cancelled);
            }
            if items.len() < self.capacity {
                items.push_back(item);
                self.not_empty.notify_one();
                return Ok(());
            }
            let (guard, _) = self.not_full.wait_timeout(items, WAIT_SLICE).unwrap();
            items = guard;
        }
    }

    /// Remove and return the front item, blocking while the queue is empty.
    ///
    /// Returns `Err(Cancelled)` once the token fires; items still queued at
    /// cancellation time are dropped with the queue, not handed out.
    pub fn pop(&self) -> Result<T, Cancelled> {
        let mut items = self.items.lock().unwrap();
        loop {
            if self.token.is_cancelled() {
                return Err(Cancelled);
            }
            if let Some(item) = items.pop_front() {
                self.not_full.notify_one();
                return Ok(item);
            }
            let (guard, _) = self.not_empty.wait_timeout(items, WAIT_SLICE).unwrap();
            items = guard;
        }
    }

    /// Snapshot of the current depth.
    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    /// True when the snapshot depth is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
