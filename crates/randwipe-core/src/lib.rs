//! # randwipe-core
//!
//! **Flood a disk with cryptographically-seeded noise until it is full.**
//!
//! `randwipe-core` is the pipeline behind the `randwipe` binary: a staged,
//! bounded producer/consumer stream that turns slow kernel entropy into a
//! high-throughput flow of pseudorandom blocks and writes them to a target
//! until the device reports "no space left".
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use randwipe_core::{OutputFile, WipeConfig, Wiper};
//!
//! let sink = OutputFile::create(Path::new("/dev/sdX")).unwrap();
//! let wiper = Wiper::new(&WipeConfig::default(), sink).unwrap();
//!
//! // Watch progress from another thread while the wipe runs.
//! let status = wiper.status();
//! assert!(status.is_running());
//!
//! let summary = wiper.run().unwrap();
//! println!("{} bytes written", summary.bytes_written);
//! ```
//!
//! ## Architecture
//!
//! Kernel entropy → seed queue → stream cipher worker → block queue → sink
//!
//! - One entropy worker reads `/dev/random` byte-by-byte (progress
//!   observable) and assembles `key || iv` seeds.
//! - One stream worker produces ChaCha20 keystream blocks, rekeying every
//!   `blocks_per_seed` blocks and optionally XOR-combining RDRAND output.
//! - The caller's thread consumes blocks and writes them through a
//!   [`BlockSink`]; `ENOSPC` ends the run normally.
//!
//! Both queues are bounded, so back-pressure flows upstream, and every
//! blocking wait observes one shared [`CancellationToken`] so shutdown
//! never hangs on a full queue or a slow entropy read.

pub mod cancel;
pub mod entropy;
pub mod error;
pub mod hwrng;
pub mod output;
pub mod pipeline;
pub mod queue;
pub mod stream;
pub mod wiper;

pub use cancel::{CancellationToken, Cancelled};
pub use entropy::{EntropyProducer, EntropySource, OsEntropy, default_source};
pub use error::WipeError;
pub use output::{BlockSink, OutputFile, WriteOutcome};
pub use pipeline::{Pipeline, StatusHandle, WipeConfig};
pub use queue::BoundedQueue;
pub use stream::{Block, IV_LEN, KEY_LEN, SEED_SIZE, Seed, StreamGenerator, StreamProducer};
pub use wiper::{WipeOutcome, WipeSummary, Wiper};

#[cfg(unix)]
pub use entropy::DevRandom;

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
