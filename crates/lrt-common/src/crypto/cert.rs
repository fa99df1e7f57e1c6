//! Certificate generation
//!
//! Display nodes without configured certificates generate a self-signed one
//! at startup. Production deployments should use proper PKI infrastructure.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, KeyUsagePurpose, SanType};

use crate::crypto::tls::fingerprint_der;
use crate::error::{LrtError, Result};

/// Information about a generated certificate
#[derive(Debug, Clone)]
pub struct CertificateInfo {
    /// PEM-encoded certificate
    pub cert_pem: String,
    /// PEM-encoded private key
    pub key_pem: String,
    /// Certificate fingerprint (SHA-256, hex)
    pub fingerprint: String,
}

/// Generate a self-signed certificate for development/testing
///
/// # Arguments
/// * `common_name` - The CN for the certificate (e.g., "pids.local")
/// * `san_dns` - Subject Alternative Names (DNS)
/// * `san_ips` - Subject Alternative Names (IP addresses)
/// * `validity_days` - How long the certificate should be valid
///
/// With no SANs given, localhost and both loopback addresses are used.
pub fn generate_self_signed_cert(
    common_name: &str,
    san_dns: &[String],
    san_ips: &[IpAddr],
    validity_days: u32,
) -> Result<CertificateInfo> {
    let mut params = CertificateParams::default();

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    dn.push(DnType::OrganizationName, "LRT PIDS");
    params.distinguished_name = dn;

    params.not_before = time::OffsetDateTime::now_utc();
    params.not_after =
        time::OffsetDateTime::now_utc() + Duration::from_secs(validity_days as u64 * 24 * 60 * 60);

    let mut sans = Vec::new();
    for dns in san_dns {
        sans.push(SanType::DnsName(dns.clone().try_into().map_err(|e| {
            LrtError::CertificateError(format!("Invalid DNS name: {}", e))
        })?));
    }
    for ip in san_ips {
        sans.push(SanType::IpAddress(*ip));
    }
    if san_dns.is_empty() && san_ips.is_empty() {
        sans.push(SanType::DnsName("localhost".to_string().try_into().map_err(
            |e| LrtError::CertificateError(format!("Invalid DNS name: {}", e)),
        )?));
        sans.push(SanType::IpAddress(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        sans.push(SanType::IpAddress(IpAddr::V6(Ipv6Addr::LOCALHOST)));
    }
    params.subject_alt_names = sans;

    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];

    let key_pair = KeyPair::generate().map_err(|e| {
        LrtError::CertificateError(format!("Failed to generate key pair: {}", e))
    })?;

    let cert = params.self_signed(&key_pair).map_err(|e| {
        LrtError::CertificateError(format!("Failed to generate certificate: {}", e))
    })?;

    Ok(CertificateInfo {
        cert_pem: cert.pem(),
        key_pem: key_pair.serialize_pem(),
        fingerprint: fingerprint_der(cert.der()),
    })
}
