//! Display node side of the transaction protocol

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{LrtError, Result};
use crate::notification::{Notification, NotificationRouter, NotificationSink};
use crate::protocol::{read_packet, write_packet, Packet};
use crate::transaction::{within, ShutdownSignal};
use crate::transport::{StreamConnection, StreamListener};

/// Default bound on stream handlers running at once
pub const DEFAULT_MAX_CONCURRENT_STREAMS: usize = 256;

/// Default time a single stream may take from accept to ack
pub const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Stream handlers allowed to run at once across all connections;
    /// further streams wait for a free slot
    pub max_concurrent_streams: usize,
    /// Deadline for reading the request and writing the ack of one stream
    pub stream_timeout: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            max_concurrent_streams: DEFAULT_MAX_CONCURRENT_STREAMS,
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
        }
    }
}

/// Result of handling one accepted stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// A request was received and this ack was sent back
    Acknowledged(Packet),
    /// The peer finished the stream without sending anything
    Empty,
}

/// Accepts connections and acknowledges every well-formed request
#[derive(Clone)]
pub struct TransactionServer {
    router: Arc<NotificationRouter>,
    sink: Arc<dyn NotificationSink>,
    options: ServerOptions,
    admission: Arc<Semaphore>,
}

impl TransactionServer {
    pub fn new(
        router: NotificationRouter,
        sink: Arc<dyn NotificationSink>,
        options: ServerOptions,
    ) -> Self {
        let admission = Arc::new(Semaphore::new(options.max_concurrent_streams.max(1)));
        Self {
            router: Arc::new(router),
            sink,
            options,
            admission,
        }
    }

    /// Accept connections until shutdown or until the listener closes
    pub async fn serve<L: StreamListener>(
        &self,
        listener: L,
        mut shutdown: ShutdownSignal,
    ) -> Result<()> {
        let mut connections = JoinSet::new();

        let result = loop {
            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                _ = shutdown.wait() => {
                    info!("Listener shutting down");
                    break Ok(());
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => continue,
            };

            match accepted {
                Some(Ok(connection)) => {
                    let server = self.clone();
                    let signal = shutdown.clone();
                    connections.spawn(async move {
                        server.serve_connection(connection, signal).await;
                    });
                }
                Some(Err(e)) => {
                    warn!("Failed to accept connection: {}", e);
                }
                None => {
                    break Err(LrtError::Transport("listener closed".to_string()));
                }
            }
        };

        // Let accepted connections finish their in-flight streams
        while connections.join_next().await.is_some() {}

        result
    }

    /// Accept streams on one connection until the peer closes it
    pub async fn serve_connection<C: StreamConnection>(
        &self,
        connection: C,
        mut shutdown: ShutdownSignal,
    ) {
        let peer = connection.peer();
        info!("Receiving connection from {}", peer);

        let mut streams = JoinSet::new();
        loop {
            let accepted = tokio::select! {
                accepted = connection.accept_stream() => accepted,
                _ = shutdown.wait() => break,
                Some(_) = streams.join_next(), if !streams.is_empty() => continue,
            };

            let (send, recv) = match accepted {
                Ok(stream) => stream,
                Err(e) => {
                    info!("[Client: {}] Connection closed: {}", peer, e);
                    break;
                }
            };

            // Waits while the node is at its stream limit
            let permit = tokio::select! {
                permit = self.admission.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = shutdown.wait() => break,
            };

            let server = self.clone();
            let peer = peer.clone();
            streams.spawn(async move {
                let _permit = permit;
                match server.handle_stream(send, recv).await {
                    Ok(StreamOutcome::Acknowledged(ack)) => {
                        debug!("[Client: {}] ACK sent for transaction {}", peer, ack.transaction_id);
                    }
                    Ok(StreamOutcome::Empty) => {
                        debug!("[Client: {}] Stream closed without a request", peer);
                    }
                    Err(e) if e.is_exchange_local() => {
                        warn!("[Client: {}] Dropped stream: {}", peer, e);
                    }
                    Err(e) => {
                        error!("[Client: {}] Stream failed: {}", peer, e);
                    }
                }
            });
        }

        while streams.join_next().await.is_some() {}
    }

    /// Read one request, announce it, and acknowledge it on the same stream
    ///
    /// Malformed frames and frames with more than one event flag are dropped
    /// without an acknowledgment.
    pub async fn handle_stream<S, R>(&self, mut send: S, mut recv: R) -> Result<StreamOutcome>
    where
        S: AsyncWrite + Unpin,
        R: AsyncRead + Unpin,
    {
        let budget = self.options.stream_timeout;
        let deadline = Instant::now() + budget;

        let packet = match within(deadline, budget, read_packet(&mut recv)).await? {
            Some(packet) => packet,
            None => return Ok(StreamOutcome::Empty),
        };

        info!(
            "Received packet: Transaction ID {}, Train Number {}, Destination {}",
            packet.transaction_id,
            packet.train_number,
            packet.destination()
        );

        packet.event()?;
        if packet.is_ack() {
            warn!(
                "Transaction {} arrived with the ack flag set",
                packet.transaction_id
            );
        }

        if let Some(message) = self.router.route(&packet) {
            self.sink.notify(Notification {
                transaction_id: packet.transaction_id,
                train_number: packet.train_number,
                message,
            });
        }

        let ack = packet.acknowledgment();
        within(deadline, budget, write_packet(&mut send, &ack)).await?;

        Ok(StreamOutcome::Acknowledged(ack))
    }
}
