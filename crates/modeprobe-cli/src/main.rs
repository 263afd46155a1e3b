// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

mod detect;
mod error;
mod info;
mod modes;
mod scenario;
mod utils;

use clap::{Parser, Subcommand};
use error::result_to_exit_code;
use std::process::ExitCode;

/// ModeProbe CLI - Capture card input format detection tool
#[derive(Parser)]
#[command(name = "modeprobe")]
#[command(version)]
#[command(about = "ModeProbe CLI - Capture card input format detection tool")]
#[command(long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (use RUST_LOG=trace for more)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output results in JSON format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the video format present on each capture device input
    #[command(after_help = "Hardware device enumeration is not available: devices are read \
from the --scenario file. Without it, the command only checks for the capture driver \
runtime and exits with code 3.")]
    Detect(detect::Args),

    /// List the display modes known to the catalog
    Modes(modes::Args),

    /// Report whether the capture driver runtime is installed
    Info(info::Args),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Detect(args) => detect::execute(args, cli.json),
        Commands::Modes(args) => modes::execute(args, cli.json),
        Commands::Info(args) => info::execute(args, cli.json),
    };

    result_to_exit_code(result)
}

/// Initialize env_logger based on verbosity flags
fn init_logging(verbose: bool, quiet: bool) {
    let env = env_logger::Env::default();

    let env = if quiet {
        env.default_filter_or("error")
    } else if verbose {
        env.default_filter_or("debug")
    } else {
        env.default_filter_or("info")
    };

    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .init();

    log::debug!("Logging initialized");
}
