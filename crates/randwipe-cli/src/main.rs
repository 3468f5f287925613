//! randwipe — overwrite a disk or file with cryptographically-seeded
//! random data until it is full.
//!
//! Exit codes: 0 for a normal end of run (target full, or operator
//! Ctrl-C), 1 for usage errors, 2 for fatal runtime failures.

mod bytesize;
mod progress;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use randwipe_core::{OutputFile, WipeConfig, WipeError, WipeOutcome, Wiper};

#[derive(Parser)]
#[command(name = "randwipe")]
#[command(about = "Overwrite a disk or file with a cryptographically-seeded random stream")]
#[command(version = randwipe_core::VERSION)]
struct Cli {
    /// Bytes to seek past before writing (K/M/G/T suffixes, × 1024)
    #[arg(short = 's', long, default_value = "0")]
    skip: String,

    /// Size of one random block (K/M/G/T suffixes, × 1024)
    #[arg(short = 'b', long, default_value = "100M")]
    blocksize: String,

    /// Block buffer capacity, in blocks
    #[arg(short = 'u', long, default_value_t = 5)]
    buffersize: usize,

    /// Blocks produced per seed
    #[arg(short = 'z', long = "blocks_per_seed", default_value_t = 100)]
    blocks_per_seed: u32,

    /// Disable the hardware-RNG XOR combiner
    #[arg(long = "disable-rdrand")]
    disable_rdrand: bool,

    /// Output path (device or file)
    path: PathBuf,
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help / --version land here too and exit 0.
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("randwipe: {err}");
            // Bad configuration is a usage error; everything else is a
            // runtime failure.
            match err {
                WipeError::Config(_) => ExitCode::from(1),
                _ => ExitCode::from(2),
            }
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, WipeError> {
    let skip = match bytesize::parse_size(&cli.skip) {
        Ok(n) => n,
        Err(reason) => return usage_error(&format!("--skip: {reason}")),
    };
    let blocksize = match bytesize::parse_size(&cli.blocksize) {
        Ok(n) => n,
        Err(reason) => return usage_error(&format!("--blocksize: {reason}")),
    };

    let config = WipeConfig {
        blocksize: blocksize as usize,
        block_buffer: cli.buffersize,
        blocks_per_seed: cli.blocks_per_seed,
        disable_hwrng: cli.disable_rdrand,
        ..WipeConfig::default()
    };
    config.validate()?;

    let mut sink = OutputFile::create(&cli.path).map_err(|e| WipeError::Sink { source: e })?;
    if skip > 0 {
        sink.skip(skip).map_err(|e| WipeError::Sink { source: e })?;
    }

    let wiper = Wiper::new(&config, sink)?;

    // Ctrl-C requests cooperative cancellation; the pipeline drains and
    // joins before the process exits.
    let token = wiper.cancel_token();
    ctrlc::set_handler(move || {
        log::info!("interrupt received, stopping");
        token.cancel();
    })
    .expect("failed to install Ctrl-C handler");

    let reporter = progress::spawn(wiper.status());
    let summary = wiper.run()?;
    let _ = reporter.join();

    println!(
        "\nDone. Wrote {:.2} GB ({} bytes){}",
        summary.bytes_written as f64 / (1024.0 * 1024.0 * 1024.0),
        summary.bytes_written,
        match summary.outcome {
            WipeOutcome::TargetFull => ", target full",
            WipeOutcome::Cancelled => ", cancelled",
        }
    );

    Ok(ExitCode::SUCCESS)
}

fn usage_error(message: &str) -> Result<ExitCode, WipeError> {
    eprintln!("randwipe: {message}");
    Ok(ExitCode::from(1))
}
