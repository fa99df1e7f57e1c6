//! Error types for LRT PIDS
//!
//! We use `thiserror` for structured error types that can be matched on;
//! the binaries wrap them in `anyhow` for propagation.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Failure to turn bytes into a [`crate::Packet`].
///
/// Returned by value for any input; decoding never panics.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("truncated header: need 6 bytes, got {len}")]
    TruncatedHeader { len: usize },

    #[error("truncated body: destination declares {declared} bytes, {available} available")]
    TruncatedBody { declared: usize, available: usize },

    #[error("destination contains non-ASCII bytes")]
    NonAsciiDestination,
}

/// Failure of the length-prefixed framing that carries frames over a stream.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingError {
    #[error("declared frame length {length} outside {min}..={max}")]
    InvalidLength { length: usize, min: usize, max: usize },

    #[error("frame length {length} does not match header ({expected} bytes)")]
    LengthMismatch { length: usize, expected: usize },

    #[error("stream ended after {received} bytes of a {expected}-byte frame")]
    TruncatedFrame { received: usize, expected: usize },
}

/// Failure to build a [`crate::Packet`] from caller-supplied fields.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("destination is {len} bytes (max: 255)")]
    DestinationTooLong { len: usize },

    #[error("destination must be ASCII: {0:?}")]
    NonAsciiDestination(String),
}

/// Central error type for LRT PIDS operations
#[derive(Error, Debug)]
pub enum LrtError {
    // === Codec Errors ===
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("Invalid packet: {0}")]
    Packet(#[from] PacketError),

    #[error("Ambiguous event: flag byte {flags:#04x} sets more than one event")]
    AmbiguousEvent { flags: u8 },

    // === Transaction Errors ===
    #[error("No response: peer closed the stream without acknowledging")]
    NoResponse,

    #[error("Acknowledgment mismatch: expected transaction {expected}, got {actual} (ack flag: {is_ack})")]
    Correlation { expected: u16, actual: u16, is_ack: bool },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    // === Transport Errors ===
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("TLS error: {0}")]
    TlsError(String),

    #[error("Certificate error: {0}")]
    CertificateError(String),

    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Internal ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LrtError {
    /// Whether this error is confined to a single exchange.
    ///
    /// Only transport establishment failures may take a node down.
    pub fn is_exchange_local(&self) -> bool {
        !matches!(
            self,
            LrtError::Transport(_) | LrtError::TlsError(_) | LrtError::CertificateError(_)
        )
    }
}

/// Result type alias using LrtError
pub type Result<T> = std::result::Result<T, LrtError>;

/// Step of a request/acknowledgment exchange that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangePhase {
    Open,
    Write,
    Read,
    Decode,
    Correlate,
    Dispatch,
}

impl fmt::Display for ExchangePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExchangePhase::Open => "stream open",
            ExchangePhase::Write => "request write",
            ExchangePhase::Read => "acknowledgment read",
            ExchangePhase::Decode => "acknowledgment decode",
            ExchangePhase::Correlate => "acknowledgment correlation",
            ExchangePhase::Dispatch => "dispatch",
        };
        f.write_str(name)
    }
}

/// A failed exchange, with enough context to diagnose it from a log line.
#[derive(Error, Debug)]
#[error("transaction {transaction_id} failed during {phase}: {source}")]
pub struct ExchangeError {
    pub transaction_id: u16,
    pub phase: ExchangePhase,
    #[source]
    pub source: LrtError,
}

impl ExchangeError {
    pub fn new(transaction_id: u16, phase: ExchangePhase, source: LrtError) -> Self {
        Self {
            transaction_id,
            phase,
            source,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.source, LrtError::Timeout(_))
    }
}

// Conversion from quinn errors
impl From<quinn::ConnectionError> for LrtError {
    fn from(err: quinn::ConnectionError) -> Self {
        match err {
            quinn::ConnectionError::ApplicationClosed(_)
            | quinn::ConnectionError::LocallyClosed => LrtError::ConnectionClosed,
            other => LrtError::Stream(other.to_string()),
        }
    }
}

impl From<quinn::ConnectError> for LrtError {
    fn from(err: quinn::ConnectError) -> Self {
        LrtError::Transport(err.to_string())
    }
}

impl From<rustls::Error> for LrtError {
    fn from(err: rustls::Error) -> Self {
        LrtError::TlsError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LrtError::Correlation {
            expected: 1,
            actual: 2,
            is_ack: true,
        };
        assert!(err.to_string().contains("expected transaction 1, got 2"));
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: LrtError = io_err.into();
        assert!(matches!(err, LrtError::Io(_)));

        let err: LrtError = DecodeError::TruncatedHeader { len: 3 }.into();
        assert!(matches!(err, LrtError::Decode(DecodeError::TruncatedHeader { len: 3 })));
    }

    #[test]
    fn test_exchange_error_context() {
        let err = ExchangeError::new(7, ExchangePhase::Read, LrtError::NoResponse);
        let text = err.to_string();
        assert!(text.contains("transaction 7"));
        assert!(text.contains("acknowledgment read"));
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_exchange_local_classification() {
        assert!(LrtError::Timeout(Duration::from_secs(1)).is_exchange_local());
        assert!(LrtError::Stream("reset".into()).is_exchange_local());
        assert!(!LrtError::Transport("refused".into()).is_exchange_local());
    }
}
