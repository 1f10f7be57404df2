//! Analytics janitor CLI library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
pub use commands::{follow_job, load_settings, run_maintenance};
