//! Transport abstractions for LRT PIDS
//!
//! The transaction protocol needs a secure, connection-oriented transport
//! with independent bidirectional streams. It sees only these traits, so the
//! same code runs over QUIC or in-memory pipes.

pub mod memory;
pub mod quic;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

pub use memory::{MemoryConnection, MemoryConnector, MemoryListener};
pub use quic::{QuicClient, QuicConnection, QuicServer, QuicServerOptions};

/// An established connection that multiplexes bidirectional streams
///
/// Cloning is cheap and shares the same underlying connection; opening a
/// stream takes `&self`.
#[async_trait]
pub trait StreamConnection: Clone + Send + Sync + 'static {
    type SendStream: AsyncWrite + Unpin + Send + 'static;
    type RecvStream: AsyncRead + Unpin + Send + 'static;

    /// Open a new bidirectional stream to the peer
    async fn open_stream(&self) -> Result<(Self::SendStream, Self::RecvStream)>;

    /// Wait for the peer to open a stream
    ///
    /// An error means the connection is finished.
    async fn accept_stream(&self) -> Result<(Self::SendStream, Self::RecvStream)>;

    /// Human-readable peer identity for logs
    fn peer(&self) -> String;
}

/// Source of inbound connections
#[async_trait]
pub trait StreamListener: Send + Sync {
    type Connection: StreamConnection;

    /// Next inbound connection
    ///
    /// `None` once the listener is closed. `Some(Err(..))` is a single
    /// failed connection attempt; the listener keeps running.
    async fn accept(&self) -> Option<Result<Self::Connection>>;
}
