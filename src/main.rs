#![allow(missing_docs)]

//! Crash-report triage CLI.
//!
//! Subcommands:
//! - `ingest`: read one crash submission document from stdin, triage it,
//!   print the result document to stdout
//! - `sweep`: reconcile the unmatched backlog against the current catalog,
//!   once or on an interval with `--watch`
//! - `init-db`: create the database schema

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use crashtriage::config::TriageConfig;
use crashtriage::report::parser::ParseLimits;
use crashtriage::store::TriageStore;
use crashtriage::{ingest, logging, sweep};

#[derive(Parser)]
#[command(name = "crashtriage", about = "Crash-report triage engine", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read one crash submission from stdin and print the result document.
    Ingest,
    /// Reconcile the unmatched backlog against the current catalog.
    Sweep {
        /// Keep running, sweeping every `sweep.interval_secs` seconds.
        #[arg(long)]
        watch: bool,
    },
    /// Create the database schema.
    InitDb,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = TriageConfig::load().context("failed to load configuration")?;

    match cli.command {
        Command::Ingest => {
            logging::init_cli(&config.logging.log_level);
            let store = open_store(&config).await?;

            let mut xmlstring = String::new();
            std::io::stdin()
                .read_to_string(&mut xmlstring)
                .context("failed to read submission from stdin")?;

            let limits = ParseLimits::from(&config.ingest);
            let result = ingest::handle_submission(&store, &limits, &xmlstring).await;
            println!("{result}");
        }

        Command::Sweep { watch: false } => {
            logging::init_cli(&config.logging.log_level);
            let store = open_store(&config).await?;
            let stats = sweep::run_sweep_once(&store, config.sweep.batch_size)
                .await
                .context("sweep pass failed")?;
            info!(
                signatures = stats.signatures,
                resolved = stats.resolved,
                skipped = stats.skipped,
                "sweep finished"
            );
        }

        Command::Sweep { watch: true } => {
            let _guard = logging::init_watch(
                Path::new(&config.logging.logs_dir),
                &config.logging.log_level,
            )?;
            let store = open_store(&config).await?;

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("shutdown signal received");
                    let _ = shutdown_tx.send(true);
                }
            });

            sweep::run_sweep_loop(&store, &config.sweep, shutdown_rx).await;
        }

        Command::InitDb => {
            logging::init_cli(&config.logging.log_level);
            let _store = open_store(&config).await?;
            info!(path = %config.storage.database_path, "schema applied");
        }
    }

    Ok(())
}

/// Open the configured database and apply the schema.
async fn open_store(config: &TriageConfig) -> Result<TriageStore> {
    let store = TriageStore::connect(Path::new(&config.storage.database_path))
        .await
        .context("failed to open database")?;
    store.migrate().await.context("failed to apply schema")?;
    Ok(store)
}
