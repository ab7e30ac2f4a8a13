//! Search Sync
//!
//! Keeps the current and legacy search indexes in step with the item
//! object store.
//!
//! # Usage
//!
//! ```bash
//! search-sync serve --role trigger|drain
//! search-sync trigger [--file EVENT.json]
//! search-sync drain [--payload JSON]
//! search-sync drain-local [--max-hops N] [--max-duration-secs S]
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/search-sync/config.toml)
//! 3. Environment variables (SEARCH_SYNC_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use sync_cli::{run_drain, run_drain_local, run_serve, run_trigger, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config.as_deref();
    let log_level = cli.log_level.as_deref();

    match cli.command {
        Commands::Serve { role } => {
            run_serve(config, log_level, role).await?;
        }
        Commands::Trigger { file } => {
            run_trigger(config, log_level, file.as_deref()).await?;
        }
        Commands::Drain { payload } => {
            run_drain(config, log_level, payload.as_deref()).await?;
        }
        Commands::DrainLocal {
            max_hops,
            max_duration_secs,
        } => {
            run_drain_local(config, log_level, max_hops, max_duration_secs).await?;
        }
    }

    Ok(())
}
