//! Cryptographic utilities for LRT PIDS
//!
//! This module provides:
//! - TLS configuration for publishers and display nodes
//! - Self-signed certificate generation for development
//!
//! ## Security Design
//!
//! - TLS 1.3 only (QUIC requirement)
//! - ALPN pins the display protocol
//! - Certificate verification is on unless explicitly skipped

pub mod cert;
pub mod tls;

pub use cert::{generate_self_signed_cert, CertificateInfo};
pub use tls::{create_client_config, create_server_config, TlsConfig, PIDS_ALPN};
