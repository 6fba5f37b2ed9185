//! CLI argument parsing for the clusters daemon.
//!
//! CLI flags override every other configuration source.

use clap::{Parser, Subcommand};

/// Topic clustering daemon
///
/// Groups text snippets contributed to named topics into labeled clusters.
#[derive(Parser, Debug)]
#[command(name = "clusters-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/topic-clusters/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server and the recurring sweep
    Start {
        /// Override HTTP port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override database path
        #[arg(long)]
        db_path: Option<String>,

        /// Serve requests without running the sweep job
        #[arg(long)]
        no_scheduler: bool,
    },

    /// Stop the running daemon
    Stop,

    /// Show daemon status
    Status,

    /// Run one sweep against the local database and exit
    ///
    /// The daemon must not be running, since it holds the database lock.
    Sweep {
        /// Database path (default from config)
        #[arg(long)]
        db_path: Option<String>,
    },

    /// Administrative commands
    Admin {
        /// Database path (default from config)
        #[arg(long)]
        db_path: Option<String>,

        #[command(subcommand)]
        command: AdminCommands,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum AdminCommands {
    /// Show database statistics
    Stats,

    /// Mark every active topic for reprocessing
    Reset,

    /// Trigger RocksDB compaction
    Compact,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_start_with_port() {
        let cli = Cli::parse_from(["clusters-daemon", "start", "-p", "9000"]);
        match cli.command {
            Commands::Start {
                port, no_scheduler, ..
            } => {
                assert_eq!(port, Some(9000));
                assert!(!no_scheduler);
            }
            _ => panic!("Expected Start command"),
        }
    }

    #[test]
    fn test_cli_start_without_scheduler() {
        let cli = Cli::parse_from(["clusters-daemon", "start", "--no-scheduler"]);
        assert!(matches!(
            cli.command,
            Commands::Start {
                no_scheduler: true,
                ..
            }
        ));
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from([
            "clusters-daemon",
            "--config",
            "/etc/clusters.toml",
            "--log-level",
            "debug",
            "status",
        ]);
        assert_eq!(cli.config.as_deref(), Some("/etc/clusters.toml"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn test_cli_stop() {
        let cli = Cli::parse_from(["clusters-daemon", "stop"]);
        assert!(matches!(cli.command, Commands::Stop));
    }

    #[test]
    fn test_cli_sweep_with_db_path() {
        let cli = Cli::parse_from(["clusters-daemon", "sweep", "--db-path", "/tmp/db"]);
        match cli.command {
            Commands::Sweep { db_path } => assert_eq!(db_path.as_deref(), Some("/tmp/db")),
            _ => panic!("Expected Sweep command"),
        }
    }

    #[test]
    fn test_cli_admin_commands() {
        let cli = Cli::parse_from(["clusters-daemon", "admin", "reset"]);
        assert!(matches!(
            cli.command,
            Commands::Admin {
                command: AdminCommands::Reset,
                ..
            }
        ));

        let cli = Cli::parse_from(["clusters-daemon", "admin", "--db-path", "/x", "stats"]);
        match cli.command {
            Commands::Admin { db_path, command } => {
                assert_eq!(db_path.as_deref(), Some("/x"));
                assert!(matches!(command, AdminCommands::Stats));
            }
            _ => panic!("Expected Admin command"),
        }
    }
}
