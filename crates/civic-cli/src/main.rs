//! # civic CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use civic_cli::health::{run_health, run_self_test};
use civic_cli::records::{run_analytics, run_decode, run_encode, RecordArgs};
use civic_fields::EncryptionService;

/// Field-level encryption tooling for the citizen portal.
#[derive(Parser, Debug)]
#[command(name = "civic", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Authenticate against the HSM and round-trip a probe value.
    SelfTest,

    /// Print the encryption health report (exit 2 when unhealthy).
    Health,

    /// Encrypt the sensitive fields of entity records.
    Encode(RecordArgs),

    /// Decrypt storage records back into entity views.
    Decode(RecordArgs),

    /// Aggregate storage records over their public fields.
    Analytics(RecordArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    // stdout carries JSON output.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli.command).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(command: Commands) -> Result<u8> {
    let mut out = std::io::stdout();

    if let Commands::Analytics(args) = &command {
        return run_analytics(args, &mut out);
    }

    let service = EncryptionService::from_env().context("invalid encryption configuration")?;
    match command {
        Commands::SelfTest => run_self_test(&service, &mut out).await,
        Commands::Health => run_health(&service, &mut out).await,
        Commands::Encode(args) => run_encode(&args, &service, &mut out).await,
        Commands::Decode(args) => run_decode(&args, &service, &mut out).await,
        Commands::Analytics(args) => run_analytics(&args, &mut out),
    }
}
