//! Fault remediator CLI
//!
//! Sends fault events to a running remediator, remediates them locally
//! against the current kubeconfig, and checks remediator health.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{health, run, send, EventArgs};
use tracing_subscriber::EnvFilter;

/// Fault remediator CLI
#[derive(Parser)]
#[command(name = "remctl")]
#[command(author, version, about = "CLI for the Kubernetes fault remediator", long_about = None)]
pub struct Cli {
    /// Remediator URL (can also be set via REMCTL_API_URL env var)
    #[arg(long, env = "REMCTL_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a fault event to the remediator
    Send {
        #[command(flatten)]
        event: EventArgs,
    },

    /// Remediate a fault event locally using the kubeconfig
    Run {
        #[command(flatten)]
        event: EventArgs,

        /// Path to kubeconfig file (uses default if not specified)
        #[arg(long, env = "KUBECONFIG")]
        kubeconfig: Option<String>,

        /// Log mutations without sending them
        #[arg(long)]
        dry_run: bool,

        /// Check pod and node state before deleting or uncordoning
        #[arg(long)]
        guarded: bool,

        /// Upper bound on each cluster call, in seconds
        #[arg(long, default_value_t = 10)]
        timeout: u64,
    },

    /// Show remediator health and readiness
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Send { event } => {
            let client = client::ApiClient::new(&cli.api_url)?;
            send::send_event(&client, &event, cli.format, cli.verbose).await?;
        }
        Commands::Run {
            event,
            kubeconfig,
            dry_run,
            guarded,
            timeout,
        } => {
            let options = run::RunOptions {
                kubeconfig: kubeconfig.as_deref(),
                dry_run,
                guarded,
                timeout_secs: timeout,
            };
            run::run_event(&event, options, cli.format).await?;
        }
        Commands::Health => {
            let client = client::ApiClient::new(&cli.api_url)?;
            health::show_health(&client, cli.format).await?;
        }
    }

    Ok(())
}
