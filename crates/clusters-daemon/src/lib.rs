//! Clusters daemon library exports.
//!
//! - `cli`: command-line parsing with clap
//! - `commands`: start, stop, status, sweep and admin implementations

pub mod cli;
pub mod commands;

pub use cli::{AdminCommands, Cli, Commands};
pub use commands::{handle_admin, run_sweep, show_status, start_daemon, stop_daemon};
