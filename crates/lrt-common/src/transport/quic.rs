//! QUIC transport implementation
//!
//! QUIC gives the display protocol:
//! - Built-in encryption (TLS 1.3)
//! - Independent streams per exchange without head-of-line blocking
//! - Half-close on each stream direction

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quinn::{
    ClientConfig as QuinnClientConfig, Connection, Endpoint, IdleTimeout, RecvStream, SendStream,
    ServerConfig as QuinnServerConfig, TransportConfig,
};

use crate::crypto::tls::{create_client_config, create_server_config, TlsConfig};
use crate::error::{LrtError, Result};
use crate::transport::{StreamConnection, StreamListener};

fn idle_timeout(duration: Duration) -> Result<IdleTimeout> {
    IdleTimeout::try_from(duration)
        .map_err(|e| LrtError::Internal(format!("Invalid idle timeout {:?}: {}", duration, e)))
}

/// QUIC client for connecting to display nodes
pub struct QuicClient {
    endpoint: Endpoint,
    server_name: String,
}

impl QuicClient {
    /// Create a new QUIC client
    ///
    /// # Arguments
    /// * `bind_addr` - Local address to bind to (use 0.0.0.0:0 for any)
    /// * `tls_config` - TLS configuration
    pub fn new(bind_addr: SocketAddr, tls_config: &TlsConfig) -> Result<Self> {
        let tls = create_client_config(tls_config)?;

        let mut client_config = QuinnClientConfig::new(Arc::new(
            quinn::crypto::rustls::QuicClientConfig::try_from(tls)
                .map_err(|e| LrtError::TlsError(format!("QUIC TLS config error: {}", e)))?,
        ));

        let mut transport = TransportConfig::default();
        transport.keep_alive_interval(Some(Duration::from_secs(15)));
        transport.max_idle_timeout(Some(idle_timeout(Duration::from_secs(60))?));
        client_config.transport_config(Arc::new(transport));

        let mut endpoint = Endpoint::client(bind_addr)
            .map_err(|e| LrtError::Transport(format!("Failed to bind {}: {}", bind_addr, e)))?;
        endpoint.set_default_client_config(client_config);

        Ok(Self {
            endpoint,
            server_name: tls_config
                .server_name
                .clone()
                .unwrap_or_else(|| "localhost".to_string()),
        })
    }

    /// Connect to a remote QUIC server
    pub async fn connect(&self, addr: SocketAddr) -> Result<QuicConnection> {
        tracing::debug!("Connecting to {} (SNI: {})", addr, self.server_name);

        let connection = self
            .endpoint
            .connect(addr, &self.server_name)?
            .await
            .map_err(|e| LrtError::Transport(format!("Handshake with {} failed: {}", addr, e)))?;

        tracing::info!(
            "Dialled from {:?} to {}",
            self.endpoint.local_addr().ok(),
            connection.remote_address()
        );

        Ok(QuicConnection::new(connection))
    }

    /// Close the endpoint and wait for peers to be notified
    pub async fn close(&self) {
        self.endpoint
            .close(quinn::VarInt::from_u32(0), b"client closing");
        self.endpoint.wait_idle().await;
    }
}

/// Transport limits for a QUIC server
#[derive(Debug, Clone)]
pub struct QuicServerOptions {
    /// Streams a single client may have open at once
    pub max_concurrent_bidi_streams: u32,
    /// Close connections idle for this long
    pub idle_timeout: Duration,
}

impl Default for QuicServerOptions {
    fn default() -> Self {
        Self {
            max_concurrent_bidi_streams: 100,
            idle_timeout: Duration::from_secs(90),
        }
    }
}

/// QUIC server for accepting publisher connections
pub struct QuicServer {
    endpoint: Endpoint,
}

impl QuicServer {
    /// Create a new QUIC server
    ///
    /// # Arguments
    /// * `bind_addr` - Address to bind to
    /// * `cert_pem` - PEM-encoded certificate
    /// * `key_pem` - PEM-encoded private key
    /// * `options` - Transport limits
    pub fn new(
        bind_addr: SocketAddr,
        cert_pem: &str,
        key_pem: &str,
        options: &QuicServerOptions,
    ) -> Result<Self> {
        let tls = create_server_config(cert_pem, key_pem)?;

        let mut server_config = QuinnServerConfig::with_crypto(Arc::new(
            quinn::crypto::rustls::QuicServerConfig::try_from(tls)
                .map_err(|e| LrtError::TlsError(format!("QUIC TLS config error: {}", e)))?,
        ));

        let mut transport = TransportConfig::default();
        transport.max_idle_timeout(Some(idle_timeout(options.idle_timeout)?));
        transport.max_concurrent_bidi_streams(options.max_concurrent_bidi_streams.into());
        // Exchanges only use bidirectional streams
        transport.max_concurrent_uni_streams(0u32.into());
        server_config.transport_config(Arc::new(transport));

        let endpoint = Endpoint::server(server_config, bind_addr)
            .map_err(|e| LrtError::Transport(format!("Failed to listen on {}: {}", bind_addr, e)))?;

        tracing::info!("Listening for QUIC connections on {}", bind_addr);

        Ok(Self { endpoint })
    }

    /// Accept the next incoming connection
    pub async fn accept(&self) -> Option<Result<QuicConnection>> {
        let incoming = self.endpoint.accept().await?;
        let remote = incoming.remote_address();

        Some(match incoming.await {
            Ok(connection) => {
                tracing::debug!("Accepted connection from {}", remote);
                Ok(QuicConnection::new(connection))
            }
            Err(e) => Err(LrtError::Transport(format!(
                "Handshake with {} failed: {}",
                remote, e
            ))),
        })
    }

    /// Get the local address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.endpoint
            .local_addr()
            .map_err(|e| LrtError::Internal(e.to_string()))
    }
}

#[async_trait]
impl StreamListener for QuicServer {
    type Connection = QuicConnection;

    async fn accept(&self) -> Option<Result<QuicConnection>> {
        QuicServer::accept(self).await
    }
}

/// Wrapper around a QUIC connection
#[derive(Debug, Clone)]
pub struct QuicConnection {
    inner: Connection,
}

impl QuicConnection {
    pub fn new(connection: Connection) -> Self {
        Self { inner: connection }
    }

    pub fn remote_address(&self) -> SocketAddr {
        self.inner.remote_address()
    }

    /// Close the connection
    pub fn close(&self, code: u32, reason: &str) {
        self.inner
            .close(quinn::VarInt::from_u32(code), reason.as_bytes());
    }
}

#[async_trait]
impl StreamConnection for QuicConnection {
    type SendStream = SendStream;
    type RecvStream = RecvStream;

    async fn open_stream(&self) -> Result<(SendStream, RecvStream)> {
        let (send, recv) = self.inner.open_bi().await?;
        tracing::debug!(
            "Opened bidirectional stream {} to {}",
            send.id(),
            self.remote_address()
        );
        Ok((send, recv))
    }

    async fn accept_stream(&self) -> Result<(SendStream, RecvStream)> {
        let (send, recv) = self.inner.accept_bi().await?;
        tracing::debug!(
            "Accepted bidirectional stream {} from {}",
            send.id(),
            self.remote_address()
        );
        Ok((send, recv))
    }

    fn peer(&self) -> String {
        self.remote_address().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::cert::generate_self_signed_cert;
    use crate::protocol::{read_packet, write_packet, Packet, TrainEvent};

    fn test_server() -> QuicServer {
        let cert_info = generate_self_signed_cert("localhost", &[], &[], 1).unwrap();
        QuicServer::new(
            "127.0.0.1:0".parse().unwrap(),
            &cert_info.cert_pem,
            &cert_info.key_pem,
            &QuicServerOptions::default(),
        )
        .unwrap()
    }

    fn test_client() -> QuicClient {
        let tls_config = TlsConfig {
            insecure_skip_verify: true,
            server_name: Some("localhost".to_string()),
            ..Default::default()
        };
        QuicClient::new("127.0.0.1:0".parse().unwrap(), &tls_config).unwrap()
    }

    #[tokio::test]
    async fn test_quic_server_creation() {
        let server = test_server();
        assert!(server.local_addr().is_ok());
    }

    #[tokio::test]
    async fn test_quic_stream_exchange() {
        let server = test_server();
        let addr = server.local_addr().unwrap();

        let server_task = tokio::spawn(async move {
            let connection = server.accept().await.unwrap().unwrap();
            let (mut send, mut recv) = connection.accept_stream().await.unwrap();
            let packet = read_packet(&mut recv).await.unwrap().unwrap();
            write_packet(&mut send, &packet.acknowledgment()).await.unwrap();
            // Keep the connection open until the client has read the ack
            let _ = connection.accept_stream().await;
        });

        let client = test_client();
        let connection = client.connect(addr).await.unwrap();
        let (mut send, mut recv) = connection.open_stream().await.unwrap();

        let packet = Packet::new(1, TrainEvent::Arriving, 42, "Harjamukti").unwrap();
        write_packet(&mut send, &packet).await.unwrap();
        let ack = read_packet(&mut recv).await.unwrap().unwrap();

        assert_eq!(ack, packet.acknowledgment());

        connection.close(0, "done");
        server_task.await.unwrap();
    }
}
