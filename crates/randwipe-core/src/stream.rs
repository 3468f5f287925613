//! Seeded stream-cipher block production.
//!
//! A [`StreamGenerator`] owns one ChaCha20 instance and turns it into
//! fixed-size blocks of keystream, optionally XOR-combined with a hardware
//! random source. The [`StreamProducer`] worker wraps a generator in the
//! reseed-every-N-blocks loop that connects the seed queue to the block
//! queue.
//!
//! The XOR combiner keeps the output at least as unpredictable as the
//! stronger of the two sources: if either input is truly random, so is the
//! result.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::{ChaCha20, Key, Nonce};

use crate::cancel::CancellationToken;
use crate::error::WipeError;
use crate::hwrng::HwRng;
use crate::queue::BoundedQueue;

/// ChaCha20 key length in bytes.
pub const KEY_LEN: usize = 32;
/// ChaCha20 IV (nonce) length in bytes.
pub const IV_LEN: usize = 12;
/// Bytes of kernel entropy consumed per rekey: `key || iv`.
pub const SEED_SIZE: usize = KEY_LEN + IV_LEN;

/// One fixed-size buffer of pseudorandom bytes, owned by exactly one
/// pipeline stage at a time.
pub type Block = Vec<u8>;

/// Rekey material for the stream cipher: `KEY_LEN` key bytes followed by
/// `IV_LEN` IV bytes. Consumed by exactly one rekey.
pub struct Seed([u8; SEED_SIZE]);

impl Seed {
    /// Wrap raw entropy bytes; the array length enforces the size
    /// invariant.
    pub fn from_bytes(bytes: [u8; SEED_SIZE]) -> Self {
        Self(bytes)
    }

    /// The key half.
    pub fn key(&self) -> &[u8] {
        &self.0[..KEY_LEN]
    }

    /// The IV half.
    pub fn iv(&self) -> &[u8] {
        &self.0[KEY_LEN..]
    }

    /// The whole `key || iv` layout.
    pub fn as_bytes(&self) -> &[u8; SEED_SIZE] {
        &self.0
    }
}

/// Stream-cipher keystream source for fixed-size blocks.
///
/// Unseeded until the first [`rekey`](Self::rekey); producing a block
/// before that is a programming error and panics.
pub struct StreamGenerator {
    cipher: Option<ChaCha20>,
    blocksize: usize,
    hwrng: Option<HwRng>,
}

impl StreamGenerator {
    /// Create an unseeded generator producing blocks of `blocksize` bytes.
    ///
    /// `hwrng` enables the XOR combiner; pass `None` to run on cipher
    /// keystream alone (deterministic for a fixed seed sequence).
    pub fn new(blocksize: usize, hwrng: Option<HwRng>) -> Self {
        assert!(blocksize >= 1, "blocksize must be at least 1 byte");
        Self {
            cipher: None,
            blocksize,
            hwrng,
        }
    }

    /// Restart the keystream from a fresh seed.
    pub fn rekey(&mut self, seed: &Seed) {
        self.cipher = Some(ChaCha20::new(
            Key::from_slice(seed.key()),
            Nonce::from_slice(seed.iv()),
        ));
    }

    /// True once the generator has been rekeyed at least once.
    pub fn is_seeded(&self) -> bool {
        self.cipher.is_some()
    }

    /// Produce the next block of the stream.
    ///
    /// # Panics
    /// Panics if called before the first [`rekey`](Self::rekey).
    pub fn next_block(&mut self) -> Block {
        let cipher = self
            .cipher
            .as_mut()
            .expect("stream generator used before first rekey");

        let mut block = vec![0u8; self.blocksize];
        cipher.apply_keystream(&mut block);

        if let Some(hwrng) = &self.hwrng {
            let mut hardware = vec![0u8; self.blocksize];
            if hwrng.fill(&mut hardware) {
                for (out, hw) in block.iter_mut().zip(&hardware) {
                    *out ^= hw;
                }
            } else {
                log::warn!("hardware RNG underflow; block uses cipher keystream only");
            }
        }

        block
    }
}

/// Worker that produces blocks from seeds until cancelled.
///
/// Pops one seed per `blocks_per_seed` produced blocks; the very first
/// iteration always pops, so no block is ever produced unseeded.
pub struct StreamProducer {
    handle: Option<JoinHandle<Result<(), WipeError>>>,
}

impl StreamProducer {
    /// Start the worker thread.
    pub fn spawn(
        generator: StreamGenerator,
        blocks_per_seed: u32,
        seeds: Arc<BoundedQueue<Seed>>,
        blocks: Arc<BoundedQueue<Block>>,
        token: CancellationToken,
    ) -> Self {
        assert!(blocks_per_seed >= 1, "blocks_per_seed must be at least 1");
        let handle = thread::Builder::new()
            .name("randwipe-stream".into())
            .spawn(move || produce_blocks(generator, blocks_per_seed, &seeds, &blocks, &token))
            .expect("failed to spawn stream worker");
        Self {
            handle: Some(handle),
        }
    }

    /// Wait for the worker to exit and surface its result.
    ///
    /// A cancellation-driven exit is `Ok(())`.
    pub fn join(&mut self) -> Result<(), WipeError> {
        match self.handle.take() {
            Some(handle) => handle.join().expect("stream worker panicked"),
            None => Ok(()),
        }
    }
}

fn produce_blocks(
    mut generator: StreamGenerator,
    blocks_per_seed: u32,
    seeds: &BoundedQueue<Seed>,
    blocks: &BoundedQueue<Block>,
    token: &CancellationToken,
) -> Result<(), WipeError> {
    log::debug!("stream worker started");
    let mut countdown: u32 = 0;
    loop {
        if token.is_cancelled() {
            break;
        }
        if countdown == 0 {
            let Ok(seed) = seeds.pop() else {
                break;
            };
            generator.rekey(&seed);
            countdown = blocks_per_seed;
            log::debug!("stream cipher rekeyed");
        }
        let block = generator.next_block();
        countdown -= 1;
        if blocks.push(block).is_err() {
            break;
        }
    }
    log::debug!("stream worker exiting");
    Ok(())
}
