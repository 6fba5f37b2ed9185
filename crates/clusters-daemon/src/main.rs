//! Topic clusters daemon
//!
//! # Usage
//!
//! ```bash
//! clusters-daemon start [--port PORT] [--db-path PATH] [--no-scheduler]
//! clusters-daemon stop
//! clusters-daemon status
//! clusters-daemon sweep [--db-path PATH]
//! clusters-daemon admin stats|reset|compact
//! ```
//!
//! # Configuration
//!
//! Later sources override earlier ones:
//! 1. Built-in defaults
//! 2. Config file (~/.config/topic-clusters/config.toml)
//! 3. `--config` file
//! 4. Environment variables (CLUSTERS_*)
//! 5. CLI flags

use anyhow::Result;
use clap::Parser;

use clusters_daemon::{
    handle_admin, run_sweep, show_status, start_daemon, stop_daemon, Cli, Commands,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            port,
            db_path,
            no_scheduler,
        } => {
            start_daemon(
                cli.config.as_deref(),
                port,
                db_path.as_deref(),
                cli.log_level.as_deref(),
                no_scheduler,
            )
            .await?;
        }
        Commands::Stop => stop_daemon()?,
        Commands::Status => show_status()?,
        Commands::Sweep { db_path } => {
            run_sweep(
                cli.config.as_deref(),
                db_path.as_deref(),
                cli.log_level.as_deref(),
            )
            .await?;
        }
        Commands::Admin { db_path, command } => {
            handle_admin(cli.config.as_deref(), db_path.as_deref(), command)?;
        }
    }

    Ok(())
}
