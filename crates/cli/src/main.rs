//! tarsum CLI - Main Entry Point
//!
//! Computes and verifies order-independent checksums of tar archives.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod config;
mod output;

use commands::{sum, verify, versions};

/// tarsum - content checksums for tar archives
#[derive(Parser)]
#[command(name = "tarsum")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ~/.tarsum/config.toml)
    #[arg(long, global = true, env = "TARSUM_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the checksum of an archive
    Sum(sum::SumArgs),

    /// Check an archive against an expected checksum
    Verify(verify::VerifyArgs),

    /// List supported checksum versions and hash algorithms
    Versions,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = config::CliConfig::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Sum(args) => sum::execute(args, &config, cli.format)?,
        Commands::Verify(args) => verify::execute(args, cli.format)?,
        Commands::Versions => versions::execute(cli.format),
    }

    Ok(())
}
