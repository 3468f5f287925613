//! Kernel entropy collection and the seed-producing worker.
//!
//! The entropy source is the slowest stage of the pipeline by orders of
//! magnitude, so it runs on its own thread and its output bounds the reseed
//! frequency. Sources are byte-oriented: the worker pulls one byte at a
//! time so the in-progress seed can be reported as a progress counter and
//! cancellation is observed between reads.

use std::fs::File;
use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use crate::cancel::CancellationToken;
use crate::error::WipeError;
use crate::queue::BoundedQueue;
use crate::stream::{SEED_SIZE, Seed};

/// A blocking, byte-oriented stream of OS entropy.
///
/// `next_byte` blocks until entropy is available. An error is fatal to the
/// pipeline; sources do not retry internally.
pub trait EntropySource: Send {
    /// Block until the next entropy byte is available.
    fn next_byte(&mut self) -> io::Result<u8>;
}

/// `/dev/random` read one byte at a time.
///
/// Byte-granular reads keep the seeding progress counter live while the
/// kernel pool refills.
#[cfg(unix)]
pub struct DevRandom {
    file: File,
}

#[cfg(unix)]
impl DevRandom {
    /// Open the kernel entropy device.
    pub fn open() -> io::Result<Self> {
        Ok(Self {
            file: File::open("/dev/random")?,
        })
    }
}

#[cfg(unix)]
impl EntropySource for DevRandom {
    fn next_byte(&mut self) -> io::Result<u8> {
        let mut byte = [0u8; 1];
        self.file.read_exact(&mut byte)?;
        Ok(byte[0])
    }
}

/// OS CSPRNG via `getrandom`, served through the byte interface.
///
/// Substitute for platforms without a readable entropy device. Refills an
/// internal buffer one syscall at a time, so the per-seed progress curve
/// sweeps quickly instead of blocking per byte.
pub struct OsEntropy {
    buffer: [u8; SEED_SIZE],
    remaining: usize,
}

impl OsEntropy {
    pub fn new() -> Self {
        Self {
            buffer: [0u8; SEED_SIZE],
            remaining: 0,
        }
    }
}

impl Default for OsEntropy {
    fn default() -> Self {
        Self::new()
    }
}

impl EntropySource for OsEntropy {
    fn next_byte(&mut self) -> io::Result<u8> {
        if self.remaining == 0 {
            getrandom::fill(&mut self.buffer).map_err(|e| io::Error::other(e.to_string()))?;
            self.remaining = self.buffer.len();
        }
        self.remaining -= 1;
        Ok(self.buffer[self.buffer.len() - 1 - self.remaining])
    }
}

/// The platform's preferred entropy source.
pub fn default_source() -> io::Result<Box<dyn EntropySource>> {
    #[cfg(unix)]
    {
        Ok(Box::new(DevRandom::open()?))
    }
    #[cfg(not(unix))]
    {
        Ok(Box::new(OsEntropy::new()))
    }
}

/// Worker that assembles seeds from an entropy source and feeds the seed
/// queue until cancelled.
pub struct EntropyProducer {
    seeding_status: Arc<AtomicUsize>,
    seeds: Arc<BoundedQueue<Seed>>,
    handle: Option<JoinHandle<Result<(), WipeError>>>,
}

impl EntropyProducer {
    /// Start the worker thread.
    pub fn spawn(
        source: Box<dyn EntropySource>,
        seeds: Arc<BoundedQueue<Seed>>,
        token: CancellationToken,
    ) -> Self {
        let seeding_status = Arc::new(AtomicUsize::new(0));
        let status = Arc::clone(&seeding_status);
        let worker_seeds = Arc::clone(&seeds);
        let handle = thread::Builder::new()
            .name("randwipe-entropy".into())
            .spawn(move || {
                let mut source = source;
                produce_seeds(source.as_mut(), &worker_seeds, &token, &status)
            })
            .expect("failed to spawn entropy worker");
        Self {
            seeding_status,
            seeds,
            handle: Some(handle),
        }
    }

    /// Bytes accumulated toward the in-progress seed, in
    /// `0..=SEED_SIZE`. Resets to 0 when a new seed starts.
    pub fn seeding_status(&self) -> usize {
        self.seeding_status.load(Ordering::Relaxed)
    }

    /// Seeds buffered and ready for rekeying.
    pub fn available_seeds(&self) -> usize {
        self.seeds.len()
    }

    /// Shared handle to the seeding progress counter.
    pub(crate) fn seeding_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.seeding_status)
    }

    /// Wait for the worker to exit and surface its result.
    ///
    /// A cancellation-driven exit is `Ok(())`.
    pub fn join(&mut self) -> Result<(), WipeError> {
        match self.handle.take() {
            Some(handle) => handle.join().expect("entropy worker panicked"),
            None => Ok(()),
        }
    }
}

fn produce_seeds(
    source: &mut dyn EntropySource,
    seeds: &BoundedQueue<Seed>,
    token: &CancellationToken,
    status: &AtomicUsize,
) -> Result<(), WipeError> {
    log::debug!("entropy worker started");
    loop {
        status.store(0, Ordering::Relaxed);
        let mut bytes = [0u8; SEED_SIZE];
        for (read, slot) in bytes.iter_mut().enumerate() {
            if token.is_cancelled() {
                log::debug!("entropy worker exiting");
                return Ok(());
            }
            *slot = match source.next_byte() {
                Ok(byte) => byte,
                Err(err) => {
                    // Fatal: cancel the pipeline so peers drain and exit.
                    log::error!("entropy source failed: {err}");
                    token.cancel();
                    return Err(WipeError::Entropy { source: err });
                }
            };
            status.store(read + 1, Ordering::Relaxed);
        }
        if seeds.push(Seed::from_bytes(bytes)).is_err() {
            log::debug!("entropy worker exiting");
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    /// Source returning a fixed byte forever.
    struct ConstantSource(u8);

    impl EntropySource for ConstantSource {
        fn next_byte(&mut self) -> io::Result<u8> {
            Ok(self.0)
        }
    }

    /// Source failing with EIO after `ok_bytes` successful reads.
    struct FailingSource {
        ok_bytes: usize,
        served: usize,
    }

    impl EntropySource for FailingSource {
        fn next_byte(&mut self) -> io::Result<u8> {
            if self.served >= self.ok_bytes {
                return Err(io::Error::from_raw_os_error(libc::EIO));
            }
            self.served += 1;
            Ok(0xAB)
        }
    }

    fn fixture(
        capacity: usize,
        source: Box<dyn EntropySource>,
    ) -> (Arc<BoundedQueue<Seed>>, CancellationToken, EntropyProducer) {
        let token = CancellationToken::new();
        let seeds = Arc::new(BoundedQueue::new(capacity, token.clone()));
        let producer = EntropyProducer::spawn(source, Arc::clone(&seeds), token.clone());
        (seeds, token, producer)
    }

    // -----------------------------------------------------------------------
    // Seed assembly
    // -----------------------------------------------------------------------

    #[test]
    fn test_seeds_have_exact_size_and_content() {
        let (seeds, token, mut producer) = fixture(4, Box::new(ConstantSource(0x01)));

        let seed = seeds.pop().unwrap();
        assert_eq!(seed.as_bytes().len(), SEED_SIZE);
        assert!(seed.as_bytes().iter().all(|&b| b == 0x01));

        token.cancel();
        producer.join().unwrap();
    }

    #[test]
    fn test_worker_fills_queue_to_capacity_and_blocks() {
        let (seeds, token, mut producer) = fixture(3, Box::new(ConstantSource(0x42)));

        let deadline = Instant::now() + Duration::from_secs(2);
        while seeds.len() < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(seeds.len(), 3);

        // Full queue: the worker parks in push without overfilling.
        thread::sleep(Duration::from_millis(150));
        assert_eq!(seeds.len(), 3);
        assert_eq!(producer.available_seeds(), 3);

        token.cancel();
        producer.join().unwrap();
    }

    #[test]
    fn test_seeding_status_stays_in_range() {
        let (seeds, token, mut producer) = fixture(2, Box::new(ConstantSource(0x99)));

        for _ in 0..50 {
            let status = producer.seeding_status();
            assert!(status <= SEED_SIZE);
            thread::sleep(Duration::from_millis(1));
        }

        let _ = seeds.pop();
        token.cancel();
        producer.join().unwrap();
    }

    // -----------------------------------------------------------------------
    // Failure and cancellation
    // -----------------------------------------------------------------------

    #[test]
    fn test_source_error_is_fatal_and_cancels_pipeline() {
        let source = FailingSource {
            ok_bytes: 2,
            served: 0,
        };
        let (seeds, token, mut producer) = fixture(4, Box::new(source));

        let err = producer.join().expect_err("worker must fail");
        assert!(matches!(err, WipeError::Entropy { .. }));
        // The failure propagates as a pipeline-wide cancel; no partial
        // seed is published.
        assert!(token.is_cancelled());
        assert_eq!(seeds.len(), 0);
    }

    #[test]
    fn test_cancel_stops_worker_promptly() {
        let (_seeds, token, mut producer) = fixture(1, Box::new(ConstantSource(0x10)));

        thread::sleep(Duration::from_millis(50));
        let start = Instant::now();
        token.cancel();
        producer.join().unwrap();
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    // -----------------------------------------------------------------------
    // OsEntropy substitute
    // -----------------------------------------------------------------------

    #[test]
    fn test_os_entropy_serves_bytes() {
        let mut source = OsEntropy::new();
        let mut bytes = [0u8; SEED_SIZE * 2];
        for slot in bytes.iter_mut() {
            *slot = source.next_byte().unwrap();
        }
        // Two consecutive seed-sized reads of CSPRNG output should not be
        // identical.
        let (a, b) = bytes.split_at(SEED_SIZE);
        assert_ne!(a, b);
    }

    #[cfg(unix)]
    #[test]
    fn test_dev_random_opens() {
        assert!(DevRandom::open().is_ok());
    }
}
