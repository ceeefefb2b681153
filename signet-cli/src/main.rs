//! Signet CLI - perceptual difference and provenance audit tool.

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use signet_core::{EngineConfig, ScanMode};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Usage or configuration error
  65  Data error (undecodable image, invalid input)
  66  Input file not found
  69  Capability unavailable (object detector)
  75  Timed out

Environment:
  SIGNET_MODE, SIGNET_SSIM_WINDOW, SIGNET_SSIM_MAX_DIM, SIGNET_FRAME_TIMEOUT_SECS, RUST_LOG";

#[derive(Parser)]
#[command(name = "signet")]
#[command(author, version, about = "Perceptual difference and provenance audits", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress human-readable output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the pHash/dHash fingerprint of an image
    Fingerprint {
        /// Path to the image
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Compare two images and report the fused delta
    Compare {
        /// Original image
        #[arg(value_name = "ORIGINAL")]
        original: PathBuf,

        /// Image to check against the original
        #[arg(value_name = "SUBMITTED")]
        submitted: PathBuf,

        /// Scan mode: quick, deep or semantic [default: SIGNET_MODE or deep]
        #[arg(short, long)]
        mode: Option<ScanMode>,

        /// Write the SSIM difference map to this PNG
        #[arg(long, value_name = "PNG")]
        diff_map: Option<PathBuf>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Audit candidate frames against labeled reference frames
    Audit {
        /// Reference frame as LABEL=IMAGE (repeatable)
        #[arg(short, long = "reference", value_name = "LABEL=IMAGE", value_parser = utils::parse_reference)]
        references: Vec<(String, PathBuf)>,

        /// Candidate frame image (repeatable)
        #[arg(short, long = "candidate", value_name = "IMAGE")]
        candidates: Vec<PathBuf>,

        /// Audio distance in [0, 1]; switches to the three-signal blend
        #[arg(long, value_name = "DISTANCE")]
        audio: Option<f64>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version also arrive here
            let code = if err.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                0
            };
            let _ = err.print();
            process::exit(code);
        }
    };

    init_tracing(cli.verbose);
    let config = EngineConfig::from_env();
    let quiet = cli.quiet;

    let result = match cli.command {
        Commands::Fingerprint { image, json } => {
            commands::fingerprint::execute(image, json, quiet).await
        }
        Commands::Compare {
            original,
            submitted,
            mode,
            diff_map,
            json,
        } => {
            commands::compare::execute(
                commands::compare::CompareArgs {
                    original,
                    submitted,
                    mode,
                    diff_map,
                    json,
                    quiet,
                },
                &config,
            )
            .await
        }
        Commands::Audit {
            references,
            candidates,
            audio,
            json,
        } => commands::audit::execute(references, candidates, audio, json, quiet).await,
    };

    if let Err(err) = result {
        let exit = ExitCode::from_anyhow(&err);
        if let Some(message) = &exit.message {
            eprintln!("{} {}", "Error:".red().bold(), message);
        }
        process::exit(exit.code);
    }
}
