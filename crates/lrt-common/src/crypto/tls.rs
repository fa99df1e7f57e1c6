//! TLS configuration utilities
//!
//! ## Security Defaults
//! - TLS 1.3 only (required by QUIC)
//! - Certificate verification enabled
//! - ALPN for protocol negotiation

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, ServerConfig, SignatureScheme};
use sha2::{Digest, Sha256};

use crate::error::{LrtError, Result};

/// ALPN protocol identifier for the display protocol
pub const PIDS_ALPN: &[u8] = b"lrt-pids/1";

/// Client-side TLS configuration
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    /// Server name for SNI
    pub server_name: Option<String>,
    /// Path to CA certificate (for a private or self-signed display node)
    pub ca_cert_path: Option<String>,
    /// Skip certificate verification (DANGEROUS - dev only)
    pub insecure_skip_verify: bool,
    /// Write session secrets to the file named by `SSLKEYLOGFILE`
    pub key_log: bool,
}

fn install_crypto_provider() {
    // Fails only if a provider is already installed
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Create a TLS client configuration
pub fn create_client_config(config: &TlsConfig) -> Result<ClientConfig> {
    install_crypto_provider();
    let builder = ClientConfig::builder();

    let mut client_config = if config.insecure_skip_verify {
        tracing::warn!("TLS certificate verification disabled - DO NOT USE IN PRODUCTION");

        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(SkipServerVerification::new()))
            .with_no_client_auth()
    } else {
        let root_store = if let Some(ca_path) = &config.ca_cert_path {
            let ca_pem = std::fs::read_to_string(ca_path).map_err(|e| {
                LrtError::CertificateError(format!("Failed to read CA cert {}: {}", ca_path, e))
            })?;
            load_root_certs_from_pem(&ca_pem)?
        } else {
            let mut root_store = RootCertStore::empty();
            root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            root_store
        };

        builder
            .with_root_certificates(root_store)
            .with_no_client_auth()
    };

    client_config.alpn_protocols = vec![PIDS_ALPN.to_vec()];
    if config.key_log {
        client_config.key_log = Arc::new(rustls::KeyLogFile::new());
    }

    Ok(client_config)
}

/// Create a TLS server configuration
pub fn create_server_config(cert_pem: &str, key_pem: &str) -> Result<ServerConfig> {
    install_crypto_provider();

    let certs = load_certs_from_pem(cert_pem)?;
    let key = load_key_from_pem(key_pem)?;

    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| LrtError::TlsError(format!("Failed to create server config: {}", e)))?;

    config.alpn_protocols = vec![PIDS_ALPN.to_vec()];

    Ok(config)
}

/// SHA-256 fingerprint of a DER certificate, hex encoded
pub fn fingerprint_der(der: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(der);
    hex::encode(hasher.finalize())
}

/// Extract certificate fingerprint (SHA-256) from a PEM certificate
pub fn get_cert_fingerprint(cert_pem: &str) -> Result<String> {
    let certs = load_certs_from_pem(cert_pem)?;
    let cert = certs
        .first()
        .ok_or_else(|| LrtError::CertificateError("No certificate found".to_string()))?;

    Ok(fingerprint_der(cert.as_ref()))
}

fn pem_error(what: &str, e: std::io::Error) -> LrtError {
    LrtError::CertificateError(format!("Failed to parse {}: {}", what, e))
}

fn load_certs_from_pem(pem: &str) -> Result<Vec<CertificateDer<'static>>> {
    let certs = rustls_pemfile::certs(&mut pem.as_bytes())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| pem_error("certificate", e))?;

    if certs.is_empty() {
        return Err(LrtError::CertificateError("No certificates found".to_string()));
    }
    Ok(certs)
}

fn load_key_from_pem(pem: &str) -> Result<PrivateKeyDer<'static>> {
    rustls_pemfile::private_key(&mut pem.as_bytes())
        .map_err(|e| pem_error("private key", e))?
        .ok_or_else(|| LrtError::CertificateError("No private key found".to_string()))
}

fn load_root_certs_from_pem(pem: &str) -> Result<RootCertStore> {
    let mut root_store = RootCertStore::empty();
    let (added, ignored) = root_store.add_parsable_certificates(load_certs_from_pem(pem)?);
    if added == 0 {
        return Err(LrtError::CertificateError(format!(
            "No usable CA certificates ({} rejected)",
            ignored
        )));
    }
    Ok(root_store)
}

/// Accepts any server certificate but still checks handshake signatures
///
/// Development only: the publisher cannot tell a display node from an
/// impostor.
#[derive(Debug)]
struct SkipServerVerification(Arc<CryptoProvider>);

impl SkipServerVerification {
    fn new() -> Self {
        Self(Arc::new(rustls::crypto::ring::default_provider()))
    }
}

impl ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
