//! LRT PIDS station control node
//!
//! The publisher is responsible for:
//! - Connecting to a display node over QUIC
//! - Dispatching train events, each on its own stream
//! - Reporting which events were acknowledged

use std::process::ExitCode;

use clap::Parser;
use tracing::Level;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod publish;

use cli::{Cli, Commands, ConfigAction, TargetArgs};
use crate::config::PublisherConfig;
use lrt_common::Packet;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if cli.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        };
        EnvFilter::new(format!("lrt_publisher={},lrt_common={}", level, level))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Send {
            transaction_id,
            event,
            train,
            destination,
            target,
        } => {
            let config = load_config(&target)?;
            let packet = Packet::new(transaction_id, event, train, destination)?;
            publish::publish(&config, vec![packet]).await
        }

        Commands::Demo { target } => {
            let config = load_config(&target)?;
            publish::publish(&config, publish::demo_packets()?).await
        }

        Commands::Config { action } => handle_config(action),
    }
}

/// Config file and environment, then command line overrides
fn load_config(target: &TargetArgs) -> anyhow::Result<PublisherConfig> {
    let mut config = PublisherConfig::load()?;

    if let Some(server) = &target.server {
        config.server_addr = server.clone();
    }
    if target.insecure {
        config.tls.insecure_skip_verify = true;
    }

    Ok(config)
}

fn handle_config(action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let config = PublisherConfig::load()?;
            println!("Server address: {}", config.server_addr);
            println!("Skip TLS verify: {}", config.tls.insecure_skip_verify);
            println!(
                "CA certificate: {}",
                config.tls.ca_cert.as_deref().unwrap_or("(system roots)")
            );
            println!("Key log: {}", config.tls.key_log);
            println!("Connect timeout: {}s", config.connection.connect_timeout_secs);
            println!("Exchange timeout: {}ms", config.connection.exchange_timeout_ms);
        }
        ConfigAction::Init { force } => {
            let path = PublisherConfig::create_default_config(force)?;
            println!("Created configuration file at {}", path.display());
        }
        ConfigAction::Path => {
            println!("{}", PublisherConfig::config_path()?.display());
        }
    }
    Ok(())
}
