//! CLI argument definitions using clap
//!
//! This module defines all command-line arguments and subcommands
//! for the station control node.

use clap::{Parser, Subcommand};
use lrt_common::TrainEvent;

/// LRT PIDS publisher - dispatch train events to display nodes
#[derive(Parser, Debug)]
#[command(name = "lrt-publisher")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a single train event and wait for its acknowledgment
    #[command(alias = "s")]
    Send {
        /// Transaction id echoed back in the acknowledgment
        #[arg(short, long)]
        transaction_id: u16,

        /// Event kind (new, update, delete, arriving, departing)
        #[arg(short, long, value_parser = parse_event)]
        event: TrainEvent,

        /// Train trip number
        #[arg(short = 'n', long)]
        train: u16,

        /// Destination station (ASCII, at most 255 bytes)
        #[arg(short, long)]
        destination: String,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Announce train 42 to Harjamukti arriving and departing, concurrently
    Demo {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Manage publisher configuration
    #[command(alias = "cfg")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Where to publish and how to trust it
#[derive(clap::Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Display node address (overrides the config file)
    #[arg(short, long)]
    pub server: Option<String>,

    /// Skip TLS verification (DANGEROUS - dev only)
    #[arg(short = 'k', long)]
    pub insecure: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Initialize a new configuration file
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Show the configuration file path
    Path,
}

fn parse_event(s: &str) -> Result<TrainEvent, String> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_arguments() {
        let cli = Cli::parse_from([
            "lrt-publisher",
            "send",
            "-t",
            "7",
            "-e",
            "arrive",
            "-n",
            "42",
            "-d",
            "Harjamukti",
            "--server",
            "10.0.0.5:3206",
            "-k",
        ]);

        match cli.command {
            Commands::Send {
                transaction_id,
                event,
                train,
                destination,
                target,
            } => {
                assert_eq!(transaction_id, 7);
                assert_eq!(event, TrainEvent::Arriving);
                assert_eq!(train, 42);
                assert_eq!(destination, "Harjamukti");
                assert_eq!(target.server.as_deref(), Some("10.0.0.5:3206"));
                assert!(target.insecure);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event_rejected() {
        let result = Cli::try_parse_from([
            "lrt-publisher",
            "send",
            "-t",
            "1",
            "-e",
            "stopping",
            "-n",
            "42",
            "-d",
            "Harjamukti",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_transaction_id_out_of_range() {
        let result = Cli::try_parse_from([
            "lrt-publisher",
            "send",
            "-t",
            "70000",
            "-e",
            "new",
            "-n",
            "1",
            "-d",
            "x",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_demo_defaults() {
        let cli = Cli::parse_from(["lrt-publisher", "-v", "demo"]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Demo { target } => {
                assert!(target.server.is_none());
                assert!(!target.insecure);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
