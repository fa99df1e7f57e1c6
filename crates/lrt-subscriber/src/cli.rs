//! CLI arguments for the display node

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// LRT PIDS subscriber - passenger information display node
#[derive(Parser, Debug)]
#[command(name = "lrt-subscriber")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/lrt-pids/subscriber.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the display node (default)
    Run,

    /// Generate a sample configuration file
    GenerateConfig,
}
