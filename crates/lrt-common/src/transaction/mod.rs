//! Per-message transaction protocol
//!
//! Every train event travels on its own short-lived bidirectional stream:
//! the publisher writes one request frame, the display node answers with one
//! acknowledgment frame, and both sides release the stream. Requests and
//! acknowledgments are correlated by the in-band transaction id, never by
//! stream ordering.

pub mod client;
pub mod server;

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::{LrtError, Result};

pub use client::{ClientOptions, TransactionClient};
pub use server::{ServerOptions, StreamOutcome, TransactionServer};

/// Run `fut` to completion unless `deadline` passes first
pub(crate) async fn within<T, F>(deadline: Instant, budget: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout_at(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(LrtError::Timeout(budget)),
    }
}

/// Shutdown signal observed by server loops
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

/// Fires the paired [`ShutdownSignal`]s
#[derive(Debug)]
pub struct ShutdownTrigger {
    sender: watch::Sender<bool>,
}

impl ShutdownSignal {
    pub fn new() -> (ShutdownTrigger, ShutdownSignal) {
        let (sender, receiver) = watch::channel(false);
        (ShutdownTrigger { sender }, ShutdownSignal { receiver })
    }

    /// Check if shutdown has been signaled
    pub fn is_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Wait for shutdown signal
    ///
    /// Never completes if the trigger is dropped without firing.
    pub async fn wait(&mut self) {
        let fired = self.receiver.wait_for(|stop| *stop).await.is_ok();
        if !fired {
            std::future::pending::<()>().await;
        }
    }
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        let _ = self.sender.send(true);
    }
}
