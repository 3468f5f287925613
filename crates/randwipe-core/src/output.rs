//! Writing produced blocks to the target.
//!
//! The sink is where "no space left" stops being an errno and becomes the
//! normal end of a wipe: a full or short write that fails with `ENOSPC`
//! reports [`WriteOutcome::NoSpace`], every other failure is fatal. Writes
//! are sequential and a partial write is only ever the terminal one.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Result of handing one block to a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The whole block landed on the target.
    Written(usize),
    /// The target is full; `written` bytes of this block made it out
    /// before `ENOSPC`.
    NoSpace { written: usize },
}

/// Consumer-side adapter the wipe driver writes blocks through.
///
/// Implementations translate `ENOSPC` into [`WriteOutcome::NoSpace`] and
/// keep a monotonic count of bytes actually written, terminal short write
/// included.
pub trait BlockSink {
    /// Write one block sequentially.
    fn write(&mut self, block: &[u8]) -> io::Result<WriteOutcome>;

    /// Total bytes accepted by the target so far.
    fn bytes_written(&self) -> u64;
}

/// File or block-device sink.
pub struct OutputFile {
    file: File,
    bytes_written: AtomicU64,
}

impl OutputFile {
    /// Open `path` for writing, creating a regular file if the target does
    /// not exist.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().write(true).create(true).open(path)?;
        Ok(Self {
            file,
            bytes_written: AtomicU64::new(0),
        })
    }

    /// Advance the write position by `bytes` before the first write.
    ///
    /// One-shot, pre-start operation; the skipped region is never touched.
    pub fn skip(&mut self, bytes: u64) -> io::Result<()> {
        let offset = i64::try_from(bytes)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "skip offset too large"))?;
        self.file.seek(SeekFrom::Current(offset))?;
        Ok(())
    }
}

impl BlockSink for OutputFile {
    fn write(&mut self, block: &[u8]) -> io::Result<WriteOutcome> {
        let mut written = 0;
        while written < block.len() {
            match self.file.write(&block[written..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "target accepted zero bytes without an error",
                    ));
                }
                Ok(n) => {
                    written += n;
                    self.bytes_written.fetch_add(n as u64, Ordering::Relaxed);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if is_no_space(&e) => {
                    log::info!("target full after {written} bytes of the final block");
                    return Ok(WriteOutcome::NoSpace { written });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(WriteOutcome::Written(written))
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }
}

/// The one place where "no space left" is recognized.
fn is_no_space(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::ENOSPC)
}
