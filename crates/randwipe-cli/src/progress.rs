//! 1-Hz terminal progress reporter.
//!
//! Rewrites a single status line once per second while the wipe runs:
//! gigabytes written, current throughput, buffer depths, and seeding
//! progress. Informational only; trailing spaces pad over the previous
//! line.

use std::io::Write;
use std::thread;
use std::time::Duration;

use randwipe_core::StatusHandle;

/// Render one status line from a snapshot.
pub fn format_line(status: &StatusHandle) -> String {
    let gb = status.bytes_written() as f64 / (1024.0 * 1024.0 * 1024.0);
    let seeding_pct = (status.seeding_progress() * 100.0).round() as u32;
    format!(
        "Written: {:.2} GB  Speed: {:.1} MB/s  Seeds: {}  Buffer: {}  Seeding: {}%",
        gb,
        status.current_speed_mbps(),
        status.seed_buffer_len(),
        status.block_buffer_len(),
        seeding_pct,
    )
}

/// Spawn the reporter thread; it exits shortly after the pipeline stops.
pub fn spawn(status: StatusHandle) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name("randwipe-progress".into())
        .spawn(move || {
            let stdout = std::io::stdout();
            while status.is_running() {
                {
                    let mut out = stdout.lock();
                    let _ = write!(out, "\r{}        ", format_line(&status));
                    let _ = out.flush();
                }
                // Sleep in short slices so the line stops promptly at
                // shutdown.
                for _ in 0..10 {
                    if !status.is_running() {
                        break;
                    }
                    thread::sleep(Duration::from_millis(100));
                }
            }
        })
        .expect("failed to spawn progress reporter")
}
