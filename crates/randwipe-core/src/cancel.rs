//! Cooperative cancellation shared by every pipeline worker.
//!
//! The token is a process-wide monotonic flag: it moves from "running" to
//! "cancelled" exactly once and never back. Workers observe it at every
//! blocking wait and at every loop iteration boundary; blocking primitives
//! use bounded-time waits so a cancelled worker wakes within ~100 ms even
//! when no complementary queue event arrives.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Signal returned by a blocking operation that was interrupted by
/// cancellation instead of completing.
///
/// Not an error from the operator's point of view; callers translate it into
/// a clean worker exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Shared monotonic stop flag.
///
/// Cloning is cheap and every clone observes the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token in the "running" state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the flag. Idempotent; there is no way to un-cancel.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Snapshot of the flag.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_token_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_is_observed() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancel_is_monotonic_and_idempotent() {
        let token = CancellationToken::new();
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_clones_share_the_flag() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancel_visible_across_threads() {
        let token = CancellationToken::new();
        let clone = token.clone();
        let handle = std::thread::spawn(move || {
            while !clone.is_cancelled() {
                std::thread::yield_now();
            }
        });
        token.cancel();
        handle.join().unwrap();
    }
}
