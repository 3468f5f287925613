//! Pipeline construction, status, and ordered shutdown.
//!
//! The orchestrator owns both hand-off queues, the cancellation token, and
//! the worker handles. Workers only ever hold `Arc` clones of the queues
//! and a token clone; nothing reaches back into the orchestrator, and the
//! queues are dropped only after every worker has been joined.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::cancel::{CancellationToken, Cancelled};
use crate::entropy::{self, EntropyProducer, EntropySource};
use crate::error::WipeError;
use crate::hwrng;
use crate::queue::BoundedQueue;
use crate::stream::{Block, SEED_SIZE, Seed, StreamGenerator, StreamProducer};

/// Tuning parameters for one pipeline run, collected in one place and
/// validated before any worker spawns.
#[derive(Debug, Clone)]
pub struct WipeConfig {
    /// Bytes per produced block.
    pub blocksize: usize,
    /// Block queue capacity, in blocks.
    pub block_buffer: usize,
    /// Seed queue capacity, in seeds. Sized generously so the stream stage
    /// rides out entropy droughts.
    pub seed_buffer: usize,
    /// Blocks produced per consumed seed.
    pub blocks_per_seed: u32,
    /// Skip the hardware-RNG XOR combiner even when the CPU has one.
    pub disable_hwrng: bool,
}

impl Default for WipeConfig {
    fn default() -> Self {
        Self {
            blocksize: 100 * 1024 * 1024,
            block_buffer: 5,
            seed_buffer: 200,
            blocks_per_seed: 10,
            disable_hwrng: false,
        }
    }
}

impl WipeConfig {
    /// Reject configurations that cannot make progress.
    pub fn validate(&self) -> Result<(), WipeError> {
        if self.blocksize == 0 {
            return Err(WipeError::Config("blocksize must be at least 1 byte".into()));
        }
        if self.block_buffer == 0 {
            return Err(WipeError::Config(
                "block buffer capacity must be at least 1".into(),
            ));
        }
        if self.seed_buffer == 0 {
            return Err(WipeError::Config(
                "seed buffer capacity must be at least 1".into(),
            ));
        }
        if self.blocks_per_seed == 0 {
            return Err(WipeError::Config("blocks_per_seed must be at least 1".into()));
        }
        Ok(())
    }
}

/// Shared scalar status, one lock or atomic per field.
///
/// Readers get a coherent per-field snapshot; no cross-field atomicity is
/// promised or needed.
struct Status {
    bytes_written: AtomicU64,
    current_speed_mbps: Mutex<f64>,
    running: AtomicBool,
}

/// The running three-stage pipeline.
///
/// The caller that constructs it is the sole consumer of the block queue
/// via [`next_block`](Self::next_block).
pub struct Pipeline {
    seeds: Arc<BoundedQueue<Seed>>,
    blocks: Arc<BoundedQueue<Block>>,
    token: CancellationToken,
    status: Arc<Status>,
    seeding: Arc<AtomicUsize>,
    entropy: EntropyProducer,
    stream: StreamProducer,
    stopped: bool,
}

impl Pipeline {
    /// Validate `config`, then spawn the entropy and stream workers bound
    /// to freshly created queues, seeding from the platform default
    /// entropy source.
    pub fn start(config: &WipeConfig) -> Result<Self, WipeError> {
        config.validate()?;
        let source = entropy::default_source().map_err(|e| WipeError::Entropy { source: e })?;
        Self::start_with_source(config, source)
    }

    /// As [`start`](Self::start), with an injected entropy source.
    pub fn start_with_source(
        config: &WipeConfig,
        source: Box<dyn EntropySource>,
    ) -> Result<Self, WipeError> {
        config.validate()?;

        let token = CancellationToken::new();
        let seeds = Arc::new(BoundedQueue::new(config.seed_buffer, token.clone()));
        let blocks = Arc::new(BoundedQueue::new(config.block_buffer, token.clone()));

        let entropy = EntropyProducer::spawn(source, Arc::clone(&seeds), token.clone());
        let seeding = entropy.seeding_counter();

        let hwrng = if config.disable_hwrng {
            None
        } else {
            hwrng::detect()
        };
        log::info!(
            "pipeline starting: blocksize={} block_buffer={} seed_buffer={} blocks_per_seed={} hwrng={}",
            config.blocksize,
            config.block_buffer,
            config.seed_buffer,
            config.blocks_per_seed,
            hwrng.is_some(),
        );

        let generator = StreamGenerator::new(config.blocksize, hwrng);
        let stream = StreamProducer::spawn(
            generator,
            config.blocks_per_seed,
            Arc::clone(&seeds),
            Arc::clone(&blocks),
            token.clone(),
        );

        Ok(Self {
            seeds,
            blocks,
            token,
            status: Arc::new(Status {
                bytes_written: AtomicU64::new(0),
                current_speed_mbps: Mutex::new(0.0),
                running: AtomicBool::new(true),
            }),
            seeding,
            entropy,
            stream,
            stopped: false,
        })
    }

    /// Pop the next produced block, blocking until one is available or the
    /// pipeline is cancelled.
    pub fn next_block(&self) -> Result<Block, Cancelled> {
        self.blocks.pop()
    }

    /// A clone of the shared cancellation token, e.g. for a Ctrl-C
    /// handler.
    pub fn cancel_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cloneable, thread-safe view of the pipeline's observable state.
    pub fn status(&self) -> StatusHandle {
        StatusHandle {
            status: Arc::clone(&self.status),
            seeding: Arc::clone(&self.seeding),
            seeds: Arc::clone(&self.seeds),
            blocks: Arc::clone(&self.blocks),
        }
    }

    /// Record one consumed block: `bytes` written in `seconds`.
    pub(crate) fn note_block_written(&self, bytes: u64, seconds: f64) {
        self.status.bytes_written.fetch_add(bytes, Ordering::Relaxed);
        if seconds > 0.0 {
            let mbps = bytes as f64 / (1024.0 * 1024.0) / seconds;
            *self.status.current_speed_mbps.lock().unwrap() = mbps;
        }
    }

    /// Cancel and join every worker, then surface the first fatal worker
    /// error.
    ///
    /// Join order matters: the stream worker (a consumer of seeds) is
    /// joined before the entropy worker, so producers blocked in `push`
    /// wake via cancellation rather than waiting for a consumer that is
    /// already gone. Idempotent.
    pub fn stop(&mut self) -> Result<(), WipeError> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;

        log::debug!("pipeline stopping");
        self.token.cancel();
        let stream_result = self.stream.join();
        let entropy_result = self.entropy.join();
        self.status.running.store(false, Ordering::SeqCst);
        log::debug!("pipeline stopped");

        // An entropy failure is the root cause when both stages report;
        // the stream worker only ever exits cleanly or cancelled.
        entropy_result.and(stream_result)
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        // Workers must never outlive the queues they reference.
        let _ = self.stop();
    }
}

/// Cheap snapshot accessors over the pipeline's shared state.
///
/// Safe to read from any thread, including while the pipeline is being
/// driven.
#[derive(Clone)]
pub struct StatusHandle {
    status: Arc<Status>,
    seeding: Arc<AtomicUsize>,
    seeds: Arc<BoundedQueue<Seed>>,
    blocks: Arc<BoundedQueue<Block>>,
}

impl StatusHandle {
    /// Throughput of the most recently consumed block, in MiB/s.
    pub fn current_speed_mbps(&self) -> f64 {
        *self.status.current_speed_mbps.lock().unwrap()
    }

    /// Total bytes the driver has written to the sink.
    pub fn bytes_written(&self) -> u64 {
        self.status.bytes_written.load(Ordering::Relaxed)
    }

    /// Blocks currently buffered between producer and sink.
    pub fn block_buffer_len(&self) -> usize {
        self.blocks.len()
    }

    /// Seeds currently buffered for future rekeys.
    pub fn seed_buffer_len(&self) -> usize {
        self.seeds.len()
    }

    /// Progress toward the in-flight seed as a fraction in `0.0..=1.0`.
    pub fn seeding_progress(&self) -> f64 {
        self.seeding.load(Ordering::Relaxed) as f64 / SEED_SIZE as f64
    }

    /// False once the pipeline has fully shut down.
    pub fn is_running(&self) -> bool {
        self.status.running.load(Ordering::SeqCst)
    }
}
