//! Connect to a display node and dispatch train events

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use lrt_common::transaction::ClientOptions;
use lrt_common::transport::{QuicClient, QuicConnection};
use lrt_common::{Packet, TrainEvent, TransactionClient};
use tracing::{error, info, warn};

use crate::config::PublisherConfig;

/// Destination used by the demo packets
pub const DEMO_DESTINATION: &str = "Harjamukti";

/// Train number used by the demo packets
pub const DEMO_TRAIN: u16 = 42;

/// Train 42 to Harjamukti arriving (transaction 1) and departing (transaction 2)
pub fn demo_packets() -> anyhow::Result<Vec<Packet>> {
    Ok(vec![
        Packet::new(1, TrainEvent::Arriving, DEMO_TRAIN, DEMO_DESTINATION)?,
        Packet::new(2, TrainEvent::Departing, DEMO_TRAIN, DEMO_DESTINATION)?,
    ])
}

async fn resolve(addr: &str) -> anyhow::Result<SocketAddr> {
    if let Ok(addr) = addr.parse() {
        return Ok(addr);
    }

    tokio::net::lookup_host(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to resolve {}: {}", addr, e))?
        .next()
        .ok_or_else(|| anyhow::anyhow!("No addresses found for {}", addr))
}

async fn connect(config: &PublisherConfig) -> anyhow::Result<(QuicClient, QuicConnection)> {
    let server_addr = resolve(&config.server_addr).await?;

    let bind_addr = if server_addr.is_ipv4() {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
    } else {
        SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
    };
    let client = QuicClient::new(bind_addr, &config.client_tls())?;

    let connection = tokio::time::timeout(
        config.connection.connect_timeout(),
        client.connect(server_addr),
    )
    .await
    .map_err(|_| anyhow::anyhow!("Connection timeout"))??;

    Ok((client, connection))
}

/// Send every packet on its own stream and report each acknowledgment
///
/// Fails if any exchange failed; the others still complete.
pub async fn publish(config: &PublisherConfig, packets: Vec<Packet>) -> anyhow::Result<()> {
    let (client, connection) = connect(config).await?;
    info!("Connected to {}", connection.remote_address());

    let transactions = TransactionClient::new(
        connection,
        ClientOptions {
            exchange_timeout: config.connection.exchange_timeout(),
        },
    );

    for packet in &packets {
        info!("Sending {}", packet);
    }

    let total = packets.len();
    let results = transactions.send_all(packets).await;

    let mut failed = 0;
    for result in &results {
        match result {
            Ok(ack) => info!(
                "ACK for transaction {}: train {} to {} ({})",
                ack.transaction_id,
                ack.train_number,
                ack.destination(),
                ack.event().ok().flatten().map_or("no event".to_string(), |e| e.to_string())
            ),
            Err(e) if e.is_timeout() => {
                failed += 1;
                warn!(
                    "{} (no acknowledgment within {:?})",
                    e,
                    config.connection.exchange_timeout()
                );
            }
            Err(e) => {
                failed += 1;
                error!("{}", e);
            }
        }
    }

    transactions.connection().close(0, "done");
    client.close().await;

    if failed > 0 {
        anyhow::bail!("{} of {} exchanges failed", failed, total);
    }

    info!("All {} packets acknowledged", total);
    Ok(())
}
