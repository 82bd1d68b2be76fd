// src/main.rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use txmirror::AgentConfig;
use txmirror::commands;

#[derive(Parser)]
#[command(name = "txmirror")]
#[command(author, version, about = "Mirror yum/dnf transaction history to a remote ledger server", long_about = None)]
struct Cli {
    /// Configuration file (default: /etc/txmirror/txmirror.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Push unsent local transactions to the ledger server
    Sync,
    /// Audit the server's copy against the local history
    Verify,
    /// List transactions stored on the server for a machine
    Transactions {
        /// Machine id to query (default: this host)
        #[arg(long)]
        machine_id: Option<String>,
    },
    /// Show one stored transaction and its package items
    Items {
        /// Transaction id to show
        transaction_id: String,
        /// Machine id to query (default: this host)
        #[arg(long)]
        machine_id: Option<String>,
    },
    /// List recorded agent runs for a machine
    Executions {
        /// Machine id to query (default: this host)
        #[arg(long)]
        machine_id: Option<String>,
    },
    /// List machine ids registered for a hostname
    MachineId {
        /// Hostname to query (default: this host)
        #[arg(long)]
        hostname: Option<String>,
    },
}

fn run(cli: Cli) -> Result<bool> {
    let config = AgentConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Sync => commands::run_sync(&config).map(|()| true),
        Commands::Verify => commands::run_verify(&config),
        Commands::Transactions { machine_id } => {
            commands::list_transactions(&config, machine_id).map(|()| true)
        }
        Commands::Items {
            transaction_id,
            machine_id,
        } => commands::show_items(&config, machine_id, &transaction_id).map(|()| true),
        Commands::Executions { machine_id } => {
            commands::list_executions(&config, machine_id).map(|()| true)
        }
        Commands::MachineId { hostname } => {
            commands::list_machine_ids(&config, hostname).map(|()| true)
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        // Verification walked everything and found discrepancies
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
