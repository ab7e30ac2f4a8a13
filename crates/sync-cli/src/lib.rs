//! search-sync library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (serve, trigger, drain, drain-local)

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands, FunctionRole};
pub use commands::{run_drain, run_drain_local, run_serve, run_trigger};
