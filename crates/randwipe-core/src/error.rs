//! Pipeline error kinds.
//!
//! Cancellation is deliberately not represented here: a worker that exits
//! because the token fired is a clean exit, not a failure. Invariant
//! violations (wrong seed length, zero queue capacity) panic instead of
//! returning; there is no recovery path for those.

use thiserror::Error;

/// Fatal pipeline failures surfaced to the caller.
#[derive(Debug, Error)]
pub enum WipeError {
    /// The OS entropy source failed during a read. Fatal: without fresh
    /// seeds the stream stage would eventually starve.
    #[error("entropy source failed: {source}")]
    Entropy {
        #[source]
        source: std::io::Error,
    },

    /// The output target failed with something other than "no space left".
    #[error("write to target failed: {source}")]
    Sink {
        #[source]
        source: std::io::Error,
    },

    /// Rejected configuration, detected before any worker spawns.
    #[error("invalid configuration: {0}")]
    Config(String),
}
