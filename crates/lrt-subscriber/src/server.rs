//! Display node runtime
//!
//! Binds the QUIC listener, runs the transaction server and drains
//! in-flight exchanges on Ctrl+C or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use lrt_common::notification::ConsoleSink;
use lrt_common::transaction::ShutdownSignal;
use lrt_common::transport::QuicServer;
use lrt_common::{NotificationRouter, TransactionServer};
use tokio::signal;
use tracing::{error, info, warn};

use crate::config::SubscriberConfig;

/// Time given to in-flight exchanges after a shutdown request
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the display node until a shutdown signal arrives
pub async fn run_server(config: SubscriberConfig) -> anyhow::Result<()> {
    let cert_pem = std::fs::read_to_string(&config.tls.cert_path)
        .with_context(|| format!("Failed to read certificate {}", config.tls.cert_path))?;
    let key_pem = std::fs::read_to_string(&config.tls.key_path)
        .with_context(|| format!("Failed to read private key {}", config.tls.key_path))?;

    let listener = QuicServer::new(
        config.listen_addr,
        &cert_pem,
        &key_pem,
        &config.limits.quic_options(),
    )?;

    let router = NotificationRouter::new(config.announcement.templates());
    info!("Announcing for platform {}", router.templates().platform);
    let server = TransactionServer::new(
        router,
        Arc::new(ConsoleSink),
        config.limits.server_options(),
    );

    let (trigger, shutdown) = ShutdownSignal::new();

    info!("LRT PIDS subscriber started");
    info!("  Listening on: {}", config.listen_addr);
    info!(
        "  Stream limit: {} (timeout {} ms)",
        config.limits.max_concurrent_streams, config.limits.stream_timeout_ms
    );

    let mut serve_handle = tokio::spawn(async move { server.serve(listener, shutdown).await });

    tokio::select! {
        _ = wait_for_shutdown() => {}
        result = &mut serve_handle => {
            return match result {
                Ok(served) => served.context("Listener stopped"),
                Err(e) => Err(anyhow::anyhow!("Server task failed: {}", e)),
            };
        }
    }

    info!("Initiating graceful shutdown...");
    trigger.trigger();

    info!("Waiting up to {:?} for exchanges to drain...", DRAIN_TIMEOUT);
    match tokio::time::timeout(DRAIN_TIMEOUT, serve_handle).await {
        Ok(Ok(Ok(()))) => info!("All exchanges drained successfully"),
        Ok(Ok(Err(e))) => warn!("Server stopped with error: {}", e),
        Ok(Err(e)) => error!("Server task failed: {}", e),
        Err(_) => warn!("Drain timeout reached, forcing shutdown"),
    }

    info!("Shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }
}
