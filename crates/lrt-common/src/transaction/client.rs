//! Publisher side of the transaction protocol

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{ExchangeError, ExchangePhase, LrtError, Result};
use crate::protocol::{read_packet, write_packet, Packet};
use crate::transaction::within;
use crate::transport::StreamConnection;

/// Default time allowed for one request/acknowledgment exchange
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Deadline for open, write and read of a single exchange combined
    pub exchange_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            exchange_timeout: DEFAULT_EXCHANGE_TIMEOUT,
        }
    }
}

/// Sends packets over an established connection, one stream per packet
#[derive(Debug, Clone)]
pub struct TransactionClient<C> {
    connection: C,
    options: ClientOptions,
}

impl<C: StreamConnection> TransactionClient<C> {
    pub fn new(connection: C, options: ClientOptions) -> Self {
        Self {
            connection,
            options,
        }
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Send one packet and wait for its acknowledgment
    pub async fn send(&self, packet: &Packet) -> std::result::Result<Packet, ExchangeError> {
        self.send_with_deadline(packet, Instant::now() + self.options.exchange_timeout)
            .await
    }

    /// Send one packet; every blocking step must finish before `deadline`
    ///
    /// The stream is released when this returns, whatever the outcome.
    pub async fn send_with_deadline(
        &self,
        packet: &Packet,
        deadline: Instant,
    ) -> std::result::Result<Packet, ExchangeError> {
        let transaction_id = packet.transaction_id;
        let budget = deadline.saturating_duration_since(Instant::now());
        let fail = |phase: ExchangePhase| {
            move |source: LrtError| ExchangeError::new(transaction_id, phase, source)
        };

        let (mut send, mut recv) = within(deadline, budget, self.connection.open_stream())
            .await
            .map_err(fail(ExchangePhase::Open))?;

        debug!(
            "[Txn {}] Sending packet to {}: {}",
            transaction_id,
            self.connection.peer(),
            packet
        );
        within(deadline, budget, write_packet(&mut send, packet))
            .await
            .map_err(fail(ExchangePhase::Write))?;

        let ack = match within(deadline, budget, read_packet(&mut recv)).await {
            Ok(Some(ack)) => ack,
            Ok(None) => return Err(fail(ExchangePhase::Read)(LrtError::NoResponse)),
            Err(e @ (LrtError::Decode(_) | LrtError::Framing(_))) => {
                return Err(fail(ExchangePhase::Decode)(e))
            }
            Err(e) => return Err(fail(ExchangePhase::Read)(e)),
        };

        correlate(packet, &ack).map_err(fail(ExchangePhase::Correlate))?;

        info!(
            "[Txn {}] Received ACK for train {} to {}",
            ack.transaction_id,
            ack.train_number,
            ack.destination()
        );
        Ok(ack)
    }

    /// Send every packet concurrently, each on its own stream
    ///
    /// Waits for all exchanges. One failure never affects another. Results
    /// are in the same order as `packets`.
    pub async fn send_all(
        &self,
        packets: Vec<Packet>,
    ) -> Vec<std::result::Result<Packet, ExchangeError>> {
        let handles: Vec<_> = packets
            .into_iter()
            .map(|packet| {
                let client = self.clone();
                let transaction_id = packet.transaction_id;
                let handle = tokio::spawn(async move { client.send(&packet).await });
                (transaction_id, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (transaction_id, handle) in handles {
            results.push(match handle.await {
                Ok(result) => result,
                Err(e) => Err(ExchangeError::new(
                    transaction_id,
                    ExchangePhase::Dispatch,
                    LrtError::Internal(format!("exchange task failed: {}", e)),
                )),
            });
        }
        results
    }
}

/// Check that `ack` answers `request`
pub fn correlate(request: &Packet, ack: &Packet) -> Result<()> {
    if !ack.is_ack() || ack.transaction_id != request.transaction_id {
        return Err(LrtError::Correlation {
            expected: request.transaction_id,
            actual: ack.transaction_id,
            is_ack: ack.is_ack(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::TrainEvent;
    use crate::transport::memory::{self, MemoryConnection, DEFAULT_PIPE_CAPACITY};
    use tokio::io::AsyncWriteExt;

    fn request(transaction_id: u16, event: TrainEvent) -> Packet {
        Packet::new(transaction_id, event, 42, "Harjamukti").unwrap()
    }

    fn client(connection: MemoryConnection) -> TransactionClient<MemoryConnection> {
        TransactionClient::new(
            connection,
            ClientOptions {
                exchange_timeout: Duration::from_secs(5),
            },
        )
    }

    #[test]
    fn test_correlate() {
        let req = request(1, TrainEvent::Arriving);
        assert!(correlate(&req, &req.acknowledgment()).is_ok());

        // Missing ack flag
        assert!(matches!(
            correlate(&req, &req),
            Err(LrtError::Correlation { is_ack: false, .. })
        ));

        // Wrong transaction
        let other = request(2, TrainEvent::Arriving).acknowledgment();
        assert!(matches!(
            correlate(&req, &other),
            Err(LrtError::Correlation {
                expected: 1,
                actual: 2,
                is_ack: true
            })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_acks_out_of_order() {
        let (local, remote) = memory::pair(DEFAULT_PIPE_CAPACITY);

        // Answer the streams in reverse order of arrival
        let responder = tokio::spawn(async move {
            let mut pending = Vec::new();
            for _ in 0..2 {
                let (send, mut recv) = remote.accept_stream().await.unwrap();
                let packet = read_packet(&mut recv).await.unwrap().unwrap();
                pending.push((send, packet));
            }
            while let Some((mut send, packet)) = pending.pop() {
                write_packet(&mut send, &packet.acknowledgment()).await.unwrap();
            }
            remote
        });

        let results = client(local)
            .send_all(vec![
                request(1, TrainEvent::Arriving),
                request(2, TrainEvent::Departing),
            ])
            .await;

        let acks: Vec<Packet> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(acks[0], request(1, TrainEvent::Arriving).acknowledgment());
        assert_eq!(acks[1], request(2, TrainEvent::Departing).acknowledgment());

        responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_mismatched_ack_rejected() {
        let (local, remote) = memory::pair(DEFAULT_PIPE_CAPACITY);

        tokio::spawn(async move {
            let (mut send, mut recv) = remote.accept_stream().await.unwrap();
            let mut packet = read_packet(&mut recv).await.unwrap().unwrap();
            packet.transaction_id += 1;
            write_packet(&mut send, &packet.acknowledgment()).await.unwrap();
        });

        let err = client(local)
            .send(&request(7, TrainEvent::Arriving))
            .await
            .unwrap_err();
        assert_eq!(err.transaction_id, 7);
        assert_eq!(err.phase, ExchangePhase::Correlate);
    }

    #[tokio::test]
    async fn test_echo_without_ack_flag_rejected() {
        let (local, remote) = memory::pair(DEFAULT_PIPE_CAPACITY);

        tokio::spawn(async move {
            let (mut send, mut recv) = remote.accept_stream().await.unwrap();
            let packet = read_packet(&mut recv).await.unwrap().unwrap();
            write_packet(&mut send, &packet).await.unwrap();
        });

        let err = client(local)
            .send(&request(3, TrainEvent::Departing))
            .await
            .unwrap_err();
        assert!(matches!(
            err.source,
            LrtError::Correlation { is_ack: false, .. }
        ));
    }

    #[tokio::test]
    async fn test_no_response() {
        let (local, remote) = memory::pair(DEFAULT_PIPE_CAPACITY);

        tokio::spawn(async move {
            let (mut send, mut recv) = remote.accept_stream().await.unwrap();
            let _ = read_packet(&mut recv).await;
            send.shutdown().await.unwrap();
        });

        let err = client(local)
            .send(&request(4, TrainEvent::Arriving))
            .await
            .unwrap_err();
        assert_eq!(err.phase, ExchangePhase::Read);
        assert!(matches!(err.source, LrtError::NoResponse));
    }

    #[tokio::test]
    async fn test_garbage_response() {
        let (local, remote) = memory::pair(DEFAULT_PIPE_CAPACITY);

        tokio::spawn(async move {
            let (mut send, mut recv) = remote.accept_stream().await.unwrap();
            let _ = read_packet(&mut recv).await;
            send.write_all(&[0, 0, 0, 2, 0xFF, 0xFF]).await.unwrap();
            send.shutdown().await.unwrap();
        });

        let err = client(local)
            .send(&request(5, TrainEvent::Arriving))
            .await
            .unwrap_err();
        assert_eq!(err.phase, ExchangePhase::Decode);
    }

    #[tokio::test]
    async fn test_timeout_releases_exchange() {
        let (local, remote) = memory::pair(DEFAULT_PIPE_CAPACITY);

        // Accept but never answer
        let silent = tokio::spawn(async move {
            let streams = remote.accept_stream().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(streams);
        });

        let client = TransactionClient::new(
            local,
            ClientOptions {
                exchange_timeout: Duration::from_millis(100),
            },
        );
        let err = client
            .send(&request(6, TrainEvent::Arriving))
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(err.phase, ExchangePhase::Read);
        silent.abort();
    }

    #[tokio::test]
    async fn test_write_timeout() {
        // One-byte pipe that the peer never drains
        let (local, remote) = memory::pair(1);

        let client = TransactionClient::new(
            local,
            ClientOptions {
                exchange_timeout: Duration::from_millis(100),
            },
        );
        assert_eq!(client.connection().peer(), remote.peer());

        let packet = Packet::new(7, TrainEvent::Departing, 42, "x".repeat(255)).unwrap();
        let err = client.send(&packet).await.unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(err.phase, ExchangePhase::Write);
        assert_eq!(err.transaction_id, 7);
        drop(remote);
    }

    #[tokio::test]
    async fn test_failure_isolated_from_siblings() {
        let (local, remote) = memory::pair(DEFAULT_PIPE_CAPACITY);

        // Acknowledge transaction 1, hang up on transaction 2
        tokio::spawn(async move {
            for _ in 0..2 {
                let (mut send, mut recv) = remote.accept_stream().await.unwrap();
                let packet = read_packet(&mut recv).await.unwrap().unwrap();
                if packet.transaction_id == 1 {
                    write_packet(&mut send, &packet.acknowledgment()).await.unwrap();
                } else {
                    send.shutdown().await.unwrap();
                }
            }
        });

        let results = client(local)
            .send_all(vec![
                request(1, TrainEvent::Arriving),
                request(2, TrainEvent::Departing),
            ])
            .await;

        assert!(results[0].is_ok());
        let err = results[1].as_ref().unwrap_err();
        assert_eq!(err.transaction_id, 2);
        assert!(matches!(err.source, LrtError::NoResponse));
    }

    #[tokio::test]
    async fn test_open_fails_when_peer_gone() {
        let (local, remote) = memory::pair(DEFAULT_PIPE_CAPACITY);
        drop(remote);

        let err = client(local)
            .send(&request(8, TrainEvent::New))
            .await
            .unwrap_err();
        assert_eq!(err.phase, ExchangePhase::Open);
    }
}
