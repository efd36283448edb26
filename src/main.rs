//! exifpix - JPEG metadata and raw pixel tool.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use thiserror::Error;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use exifpix::codec::markers;
use exifpix::config::{CheckArgs, Cli, Command, DecodeArgs, EncodeArgs, ExifArgs, InputArgs};
use exifpix::exif::{self, orientation, Document};
use exifpix::{is_broken, Decoder, Encoder, JpegError};

/// Failures of the command-line front end.
#[derive(Debug, Error)]
enum CliError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Jpeg(#[from] JpegError),

    #[error("Failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Exif(args) => run_exif(&args),
        Command::Orientation(args) => run_orientation(&args),
        Command::Decode(args) => run_decode(&args),
        Command::Encode(args) => run_encode(&args),
        Command::Check(args) => return run_check(&args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose { "exifpix=debug" } else { "exifpix=info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn read(path: &Path) -> Result<Vec<u8>, CliError> {
    std::fs::read(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn write(path: &Path, data: &[u8]) -> Result<(), CliError> {
    std::fs::write(path, data).map_err(|source| CliError::Write {
        path: path.to_path_buf(),
        source,
    })
}

// =============================================================================
// Metadata Commands
// =============================================================================

fn run_exif(args: &ExifArgs) -> Result<(), CliError> {
    let data = read(&args.input)?;

    let document = if args.raw {
        exif::parse(&data).map_err(JpegError::from)?
    } else {
        let header = markers::read_header(&data).map_err(JpegError::from)?;
        match header.exif_payload() {
            Some(blob) => exif::parse(blob).map_err(JpegError::from)?,
            None => {
                info!("No Exif segment in {}", args.input.display());
                Document::new()
            }
        }
    };

    let json = if args.pretty {
        serde_json::to_string_pretty(&document)?
    } else {
        serde_json::to_string(&document)?
    };
    println!("{}", json);
    Ok(())
}

fn run_orientation(args: &InputArgs) -> Result<(), CliError> {
    let data = read(&args.input)?;
    let header = markers::read_header(&data).map_err(JpegError::from)?;
    let orientation = orientation::resolve_segments(header.app1_payloads());
    println!("{}", orientation.code());
    Ok(())
}

// =============================================================================
// Pixel Commands
// =============================================================================

fn run_decode(args: &DecodeArgs) -> Result<(), CliError> {
    let options = args.decoder_options()?;
    let data = read(&args.input)?;

    let mut decoder = Decoder::new(options)?;
    let decoded = decoder.decode(&data)?;
    write(&args.output, decoded.data())?;

    info!(
        "Wrote {}x{} {} pixels to {}",
        decoded.pixels.width(),
        decoded.pixels.height(),
        options.pixel_format,
        args.output.display()
    );

    if let Some(meta) = &decoded.meta {
        println!("{}", serde_json::to_string_pretty(meta)?);
    }
    Ok(())
}

fn run_encode(args: &EncodeArgs) -> Result<(), CliError> {
    let options = args.encoder_options()?;
    let raw = read(&args.input)?;

    let encoder = Encoder::new(args.width, args.height, options)?;
    debug!(stride = encoder.stride(), expected = encoder.input_len(), "Encoder ready");

    let jpeg = encoder.encode(&raw)?;
    write(&args.output, &jpeg)?;

    info!("Wrote {} bytes to {}", jpeg.len(), args.output.display());
    Ok(())
}

// =============================================================================
// Check Command
// =============================================================================

fn run_check(args: &CheckArgs) -> ExitCode {
    let mut failed = 0;

    for path in &args.inputs {
        match read(path) {
            Ok(data) if is_broken(&data) => {
                println!("✗ {}: broken", path.display());
                failed += 1;
            }
            Ok(_) => println!("✓ {}", path.display()),
            Err(e) => {
                println!("✗ {}", e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        error!("{} of {} file(s) failed", failed, args.inputs.len());
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
