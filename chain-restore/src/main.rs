//! Chain Restore - Main entry point
//!
//! Restores the node's chain store when the restore marker is set.

use anyhow::Result;
use chain_restore::import::GethImportRunner;
use chain_restore::marker::RestoreMarker;
use chain_restore::{storage, utils, Config, RestorePipeline};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Restore the chain store if the node is in restore mode (default)
    Run {
        /// Restore even when the marker is absent
        #[arg(long)]
        force: bool,
    },
    /// Print the segments a restore would replay, without downloading them
    Plan {
        /// Print the chain as JSON
        #[arg(long)]
        json: bool,
    },
    /// Report whether a restore is pending
    Status,
    /// Set the restore marker so the next boot restores first
    Arm,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load(args.config.as_deref())?;

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level, &config.log.output)?;

    tracing::info!("chain-restore v{}", env!("CARGO_PKG_VERSION"));

    let marker = RestoreMarker::new(config.restore.marker_path.clone());

    match args.command.unwrap_or(Command::Run { force: false }) {
        Command::Status => {
            if marker.is_present().await? {
                println!("restore pending ({})", marker.path().display());
            } else {
                println!("no restore pending");
            }
        }
        Command::Arm => {
            marker.arm().await?;
            println!("restore marker set at {}", marker.path().display());
        }
        Command::Plan { json } => {
            let pipeline = build_pipeline(&config)?;
            let (manifest, chain) = pipeline.plan().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&chain)?);
            } else {
                println!(
                    "{} of {} segments selected",
                    chain.len(),
                    manifest.len()
                );
                for segment in chain.iter() {
                    println!(
                        "{:>12} {:>12}  {}  {}",
                        segment.start_block.height,
                        segment.end_block.height,
                        segment.captured_at.to_rfc3339(),
                        segment.file
                    );
                }
            }
        }
        Command::Run { force } => {
            if !force && !marker.is_present().await? {
                tracing::info!(
                    "No restore marker at {}, nothing to do",
                    marker.path().display()
                );
                return Ok(());
            }

            let pipeline = build_pipeline(&config)?;
            let run = pipeline.run().await?;

            let failed = run.failed_imports();
            if failed.is_empty() {
                tracing::info!("Restore {} complete: {} segments", run.run_id, run.imported.len());
            } else {
                tracing::warn!(
                    "Restore {} complete with failed imports: {}",
                    run.run_id,
                    failed.join(", ")
                );
            }
        }
    }

    Ok(())
}

fn build_pipeline(config: &Config) -> Result<RestorePipeline> {
    let store = storage::from_config(config.storage()?)?;
    let runner = Arc::new(GethImportRunner::new(&config.import));
    tracing::info!("Blob store: {}", store.describe());
    Ok(RestorePipeline::from_config(config, store, runner)?)
}
