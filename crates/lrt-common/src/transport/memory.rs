//! In-memory transport
//!
//! Connections and streams backed by `tokio::io::duplex` pipes. Used to run
//! the transaction protocol without sockets or certificates. A small pipe
//! capacity makes every frame arrive in several reads.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, Mutex};

use crate::error::{LrtError, Result};
use crate::transport::{StreamConnection, StreamListener};

/// Default pipe capacity per stream
pub const DEFAULT_PIPE_CAPACITY: usize = 64 * 1024;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// One side of an in-memory connection
#[derive(Debug, Clone)]
pub struct MemoryConnection {
    id: u64,
    capacity: usize,
    outgoing: mpsc::UnboundedSender<DuplexStream>,
    incoming: Arc<Mutex<mpsc::UnboundedReceiver<DuplexStream>>>,
}

/// Create both ends of a connection
pub fn pair(capacity: usize) -> (MemoryConnection, MemoryConnection) {
    let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();

    let a = MemoryConnection {
        id,
        capacity,
        outgoing: b_tx,
        incoming: Arc::new(Mutex::new(a_rx)),
    };
    let b = MemoryConnection {
        id,
        capacity,
        outgoing: a_tx,
        incoming: Arc::new(Mutex::new(b_rx)),
    };
    (a, b)
}

fn into_halves(stream: DuplexStream) -> (WriteHalf<DuplexStream>, ReadHalf<DuplexStream>) {
    let (recv, send) = tokio::io::split(stream);
    (send, recv)
}

#[async_trait]
impl StreamConnection for MemoryConnection {
    type SendStream = WriteHalf<DuplexStream>;
    type RecvStream = ReadHalf<DuplexStream>;

    async fn open_stream(&self) -> Result<(Self::SendStream, Self::RecvStream)> {
        let (local, remote) = tokio::io::duplex(self.capacity);
        self.outgoing
            .send(remote)
            .map_err(|_| LrtError::ConnectionClosed)?;
        Ok(into_halves(local))
    }

    async fn accept_stream(&self) -> Result<(Self::SendStream, Self::RecvStream)> {
        let mut incoming = self.incoming.lock().await;
        incoming
            .recv()
            .await
            .map(into_halves)
            .ok_or(LrtError::ConnectionClosed)
    }

    fn peer(&self) -> String {
        format!("memory:{}", self.id)
    }
}

/// Accepts connections made through a [`MemoryConnector`]
#[derive(Debug)]
pub struct MemoryListener {
    incoming: Mutex<mpsc::UnboundedReceiver<MemoryConnection>>,
}

/// Dials a [`MemoryListener`]
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    capacity: usize,
    outgoing: mpsc::UnboundedSender<MemoryConnection>,
}

/// Create a listener and a connector bound to it
pub fn listener(capacity: usize) -> (MemoryListener, MemoryConnector) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        MemoryListener {
            incoming: Mutex::new(rx),
        },
        MemoryConnector {
            capacity,
            outgoing: tx,
        },
    )
}

impl MemoryConnector {
    pub fn connect(&self) -> Result<MemoryConnection> {
        let (client, server) = pair(self.capacity);
        self.outgoing
            .send(server)
            .map_err(|_| LrtError::Transport("memory listener closed".to_string()))?;
        Ok(client)
    }
}

#[async_trait]
impl StreamListener for MemoryListener {
    type Connection = MemoryConnection;

    async fn accept(&self) -> Option<Result<MemoryConnection>> {
        self.incoming.lock().await.recv().await.map(Ok)
    }
}
