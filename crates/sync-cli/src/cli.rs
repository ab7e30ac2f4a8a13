//! CLI argument parsing for search-sync.
//!
//! CLI flags override all other config sources.

use clap::{Parser, Subcommand, ValueEnum};

/// Search Sync
///
/// Mirrors item objects into the current and legacy search indexes.
#[derive(Parser, Debug)]
#[command(name = "search-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/search-sync/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Function a `serve` deployment runs.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FunctionRole {
    /// Object-store notification handler
    Trigger,
    /// Retry-queue drain, one envelope per invocation
    Drain,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run as a deployed function, taking invocations from the runtime API
    Serve {
        /// Which function this deployment is
        #[arg(short, long, value_enum)]
        role: FunctionRole,
    },

    /// Handle one object-store event document
    Trigger {
        /// Read the event document from a file instead of stdin
        #[arg(short, long)]
        file: Option<String>,
    },

    /// Run one drain hop and request the next through the runtime
    Drain {
        /// Trigger payload forwarded to the next hop (JSON, default `{}`)
        #[arg(short, long)]
        payload: Option<String>,
    },

    /// Drain the retry queue in a local loop
    DrainLocal {
        /// Override drain.max_hops
        #[arg(long)]
        max_hops: Option<usize>,

        /// Override drain.max_duration_secs
        #[arg(long)]
        max_duration_secs: Option<u64>,
    },
}
