//! # lrt-common
//!
//! Shared components for the LRT passenger information display system.
//!
//! This crate contains:
//! - The bit-packed train event frame and its codec
//! - Length-prefixed stream framing
//! - The per-message request/acknowledgment transaction protocol
//! - Notification routing for display nodes
//! - Transport abstractions (QUIC and in-memory)
//! - TLS/crypto utilities
//!
//! ## Architecture
//!
//! The codec and the transaction protocol only see the [`transport::StreamConnection`]
//! and [`transport::StreamListener`] traits, so the same code runs over QUIC in
//! production and over in-memory pipes in tests.

pub mod crypto;
pub mod error;
pub mod notification;
pub mod protocol;
pub mod transaction;
pub mod transport;

// Re-export commonly used items at crate root
pub use error::{DecodeError, ExchangeError, ExchangePhase, LrtError, Result};
pub use notification::{AnnouncementTemplates, Notification, NotificationRouter, NotificationSink};
pub use protocol::{Flags, Packet, PacketHeader, TrainEvent};
pub use transaction::{TransactionClient, TransactionServer};
