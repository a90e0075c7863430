use clap::{Parser, Subcommand};
use meshtrace_runner::{reconstruct, synth, ReconstructArgs, SynthArgs};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Reconstructs repeater paths from prefix-only mesh packet traces.
#[derive(Debug, Parser)]
#[command(name = "meshtrace", version, about)]
struct Cli {
    /// Enable debug logging. RUST_LOG takes precedence when set.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Decode packets against a node list and discover hidden repeaters.
    Reconstruct(ReconstructArgs),
    /// Generate a synthetic mesh with known ground truth.
    Synth(SynthArgs),
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    if verbose {
        info!("Verbose logging enabled (DEBUG level)");
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    meshtrace_metrics::describe_metrics();

    let result = match &cli.command {
        Command::Reconstruct(args) => reconstruct(args).map(|_| ()),
        Command::Synth(args) => synth(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
