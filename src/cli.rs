//! CLI argument parsing for the safar-worker binary.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "safar-worker", about = "Safar itinerary planning worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the worker server (default if no subcommand given)
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// Drop every stored hotspot distance. Required after any hotspot
    /// coordinate change — cached pairs never expire on their own.
    FlushDistanceCache,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_migrate_command_parses() {
        let cli = Cli::parse_from(["safar-worker", "migrate"]);
        assert!(matches!(cli.command, Some(Command::Migrate)));
    }

    #[test]
    fn test_cli_no_command_defaults_to_none() {
        let cli = Cli::parse_from(["safar-worker"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_flush_command_parses() {
        let cli = Cli::parse_from(["safar-worker", "flush-distance-cache"]);
        assert!(matches!(cli.command, Some(Command::FlushDistanceCache)));
    }
}
