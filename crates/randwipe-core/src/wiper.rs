//! The main-thread consumer loop that drives a wipe to completion.
//!
//! A [`Wiper`] couples a running [`Pipeline`] to a [`BlockSink`] and pops
//! blocks until the target reports "no space left", the operator cancels,
//! or something fails. Whatever the exit path, the pipeline is shut down
//! in order before the sink is released.

use std::time::Instant;

use crate::error::WipeError;
use crate::output::{BlockSink, WriteOutcome};
use crate::pipeline::{Pipeline, StatusHandle, WipeConfig};
use crate::{cancel::CancellationToken, entropy::EntropySource};

/// Why a wipe stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WipeOutcome {
    /// The target accepted no more bytes. The normal end of a run.
    TargetFull,
    /// The operator cancelled before the target filled up.
    Cancelled,
}

/// End-of-run report.
#[derive(Debug, Clone, Copy)]
pub struct WipeSummary {
    /// Bytes that actually landed on the target, terminal short write
    /// included.
    pub bytes_written: u64,
    pub outcome: WipeOutcome,
}

/// Pipeline plus sink, ready to run.
pub struct Wiper<S: BlockSink> {
    pipeline: Pipeline,
    sink: S,
}

impl<S: BlockSink> Wiper<S> {
    /// Start the pipeline workers against the platform entropy source.
    pub fn new(config: &WipeConfig, sink: S) -> Result<Self, WipeError> {
        Ok(Self {
            pipeline: Pipeline::start(config)?,
            sink,
        })
    }

    /// As [`new`](Self::new), with an injected entropy source.
    pub fn with_source(
        config: &WipeConfig,
        sink: S,
        source: Box<dyn EntropySource>,
    ) -> Result<Self, WipeError> {
        Ok(Self {
            pipeline: Pipeline::start_with_source(config, source)?,
            sink,
        })
    }

    /// Status snapshot handle, cloneable into a reporter thread.
    pub fn status(&self) -> StatusHandle {
        self.pipeline.status()
    }

    /// Token a Ctrl-C handler can use to request cancellation.
    pub fn cancel_token(&self) -> CancellationToken {
        self.pipeline.cancel_token()
    }

    /// Write blocks to the sink until the target is full, the run is
    /// cancelled, or a fatal error occurs.
    ///
    /// Consumes the wiper: the pipeline is stopped and every worker joined
    /// before this returns, so a fatal worker error (e.g. an entropy read
    /// failure) surfaces here.
    pub fn run(mut self) -> Result<WipeSummary, WipeError> {
        let outcome = loop {
            let started = Instant::now();

            let block = match self.pipeline.next_block() {
                Ok(block) => block,
                // Either the operator cancelled or a worker failed and
                // cancelled the pipeline; stop() below tells them apart.
                Err(_) => break WipeOutcome::Cancelled,
            };

            let write = match self.sink.write(&block) {
                Ok(outcome) => outcome,
                Err(err) => {
                    let _ = self.pipeline.stop();
                    return Err(WipeError::Sink { source: err });
                }
            };

            match write {
                WriteOutcome::Written(n) => {
                    self.pipeline
                        .note_block_written(n as u64, started.elapsed().as_secs_f64());
                }
                WriteOutcome::NoSpace { written } => {
                    if written > 0 {
                        self.pipeline
                            .note_block_written(written as u64, started.elapsed().as_secs_f64());
                    }
                    break WipeOutcome::TargetFull;
                }
            }
        };

        self.pipeline.stop()?;

        let summary = WipeSummary {
            bytes_written: self.sink.bytes_written(),
            outcome,
        };
        log::info!(
            "wipe finished: {} bytes written, outcome {:?}",
            summary.bytes_written,
            summary.outcome,
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct ConstantSource(u8);

    impl EntropySource for ConstantSource {
        fn next_byte(&mut self) -> io::Result<u8> {
            Ok(self.0)
        }
    }

    /// In-memory sink with a fixed capacity, reporting `NoSpace` exactly
    /// like a full device.
    struct CapacitySink {
        data: Vec<u8>,
        capacity: usize,
    }

    impl CapacitySink {
        fn new(capacity: usize) -> Self {
            Self {
                data: Vec::new(),
                capacity,
            }
        }
    }

    impl BlockSink for CapacitySink {
        fn write(&mut self, block: &[u8]) -> io::Result<WriteOutcome> {
            let room = self.capacity - self.data.len();
            if room >= block.len() {
                self.data.extend_from_slice(block);
                Ok(WriteOutcome::Written(block.len()))
            } else {
                self.data.extend_from_slice(&block[..room]);
                Ok(WriteOutcome::NoSpace { written: room })
            }
        }

        fn bytes_written(&self) -> u64 {
            self.data.len() as u64
        }
    }

    /// Sink that fails with EIO on the given write index.
    struct BrokenSink {
        writes_before_error: usize,
        written: u64,
    }

    impl BlockSink for BrokenSink {
        fn write(&mut self, block: &[u8]) -> io::Result<WriteOutcome> {
            if self.writes_before_error == 0 {
                return Err(io::Error::from_raw_os_error(libc::EIO));
            }
            self.writes_before_error -= 1;
            self.written += block.len() as u64;
            Ok(WriteOutcome::Written(block.len()))
        }

        fn bytes_written(&self) -> u64 {
            self.written
        }
    }

    fn config(blocksize: usize) -> WipeConfig {
        WipeConfig {
            blocksize,
            block_buffer: 2,
            seed_buffer: 4,
            blocks_per_seed: 4,
            disable_hwrng: true,
        }
    }

    #[test]
    fn test_run_fills_target_exactly() {
        let wiper = Wiper::with_source(
            &config(1024),
            CapacitySink::new(10 * 1024),
            Box::new(ConstantSource(0x01)),
        )
        .unwrap();
        let status = wiper.status();

        let summary = wiper.run().unwrap();
        assert_eq!(summary.outcome, WipeOutcome::TargetFull);
        assert_eq!(summary.bytes_written, 10 * 1024);
        assert_eq!(status.bytes_written(), 10 * 1024);
        assert!(!status.is_running());
    }

    #[test]
    fn test_target_exactly_one_block_long() {
        // One full write, then the next block yields NoSpace.
        let wiper = Wiper::with_source(
            &config(1024),
            CapacitySink::new(1024),
            Box::new(ConstantSource(0x06)),
        )
        .unwrap();

        let summary = wiper.run().unwrap();
        assert_eq!(summary.outcome, WipeOutcome::TargetFull);
        assert_eq!(summary.bytes_written, 1024);
    }

    #[test]
    fn test_run_handles_terminal_short_write() {
        // Capacity is not a multiple of the blocksize: the final block is
        // partially written and still counted.
        let wiper = Wiper::with_source(
            &config(1024),
            CapacitySink::new(2500),
            Box::new(ConstantSource(0x02)),
        )
        .unwrap();

        let summary = wiper.run().unwrap();
        assert_eq!(summary.outcome, WipeOutcome::TargetFull);
        assert_eq!(summary.bytes_written, 2500);
    }

    #[test]
    fn test_zero_capacity_target_writes_nothing() {
        let wiper = Wiper::with_source(
            &config(1024),
            CapacitySink::new(0),
            Box::new(ConstantSource(0x03)),
        )
        .unwrap();

        let summary = wiper.run().unwrap();
        assert_eq!(summary.outcome, WipeOutcome::TargetFull);
        assert_eq!(summary.bytes_written, 0);
    }

    #[test]
    fn test_sink_error_is_fatal() {
        let wiper = Wiper::with_source(
            &config(512),
            BrokenSink {
                writes_before_error: 2,
                written: 0,
            },
            Box::new(ConstantSource(0x04)),
        )
        .unwrap();
        let status = wiper.status();

        let err = wiper.run().expect_err("EIO must surface");
        assert!(matches!(err, WipeError::Sink { .. }));
        assert!(!status.is_running());
    }

    #[test]
    fn test_cancel_ends_run_cleanly() {
        let wiper = Wiper::with_source(
            &config(256),
            CapacitySink::new(usize::MAX / 2),
            Box::new(ConstantSource(0x05)),
        )
        .unwrap();
        let token = wiper.cancel_token();
        token.cancel();

        let summary = wiper.run().unwrap();
        assert_eq!(summary.outcome, WipeOutcome::Cancelled);
    }
}
