//! LRT PIDS display node
//!
//! The subscriber is responsible for:
//! - Accepting publisher connections over QUIC
//! - Acknowledging every train event it receives
//! - Announcing arrivals and departures on the operator console

use std::process::ExitCode;

use clap::Parser;
use tracing::Level;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod server;

use cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if cli.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        };
        EnvFilter::new(format!("lrt_subscriber={},lrt_common={}", level, level))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(false)
        .json()
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Fatal error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    use cli::Commands;

    match cli.command {
        Some(Commands::GenerateConfig) => {
            println!("{}", config::SubscriberConfig::generate_sample_config());
            return Ok(());
        }
        Some(Commands::Run) | None => {}
    }

    let config = config::SubscriberConfig::load(&cli.config)?;

    tracing::info!(
        "Starting LRT PIDS subscriber v{}",
        env!("CARGO_PKG_VERSION")
    );
    tracing::info!("Listening address: {}", config.listen_addr);

    server::run_server(config).await
}
