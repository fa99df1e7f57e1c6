//! Publisher configuration management
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (`<config dir>/lrt-pids/config.toml`)
//! 3. Environment variables (`LRT_PUBLISHER__*`)
//! 4. Command line arguments (highest priority)

use std::path::{Path, PathBuf};
use std::time::Duration;

use lrt_common::crypto::TlsConfig;
use serde::{Deserialize, Serialize};

/// Main publisher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// Display node address
    #[serde(default = "default_server_addr")]
    pub server_addr: String,

    /// TLS configuration
    #[serde(default)]
    pub tls: TlsSettings,

    /// Connection settings
    #[serde(default)]
    pub connection: ConnectionSettings,
}

fn default_server_addr() -> String {
    "localhost:3206".to_string()
}

/// TLS-specific settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsSettings {
    /// Skip TLS verification (DANGEROUS - dev only)
    #[serde(default)]
    pub insecure_skip_verify: bool,

    /// Path to CA certificate
    pub ca_cert: Option<String>,

    /// Server name for SNI; defaults to the host part of `server_addr`
    pub server_name: Option<String>,

    /// Log session secrets to the file named by `SSLKEYLOGFILE`
    #[serde(default)]
    pub key_log: bool,
}

/// Connection behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Deadline for one request/ack exchange in milliseconds
    #[serde(default = "default_exchange_timeout")]
    pub exchange_timeout_ms: u64,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_exchange_timeout() -> u64 {
    10_000
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            exchange_timeout_ms: default_exchange_timeout(),
        }
    }
}

impl ConnectionSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn exchange_timeout(&self) -> Duration {
        Duration::from_millis(self.exchange_timeout_ms)
    }
}

const DEFAULT_CONFIG: &str = r#"# LRT PIDS Publisher Configuration

# Display node address
server_addr = "localhost:3206"

[tls]
# Skip TLS verification (DANGEROUS - development only!)
insecure_skip_verify = true

# Custom CA certificate for a private display node
# ca_cert = "/path/to/subscriber.crt"

# Server name for SNI (defaults to the host in server_addr)
# server_name = "pids.station.local"

# Write TLS session secrets to $SSLKEYLOGFILE for packet inspection
key_log = false

[connection]
# Connection timeout (seconds)
connect_timeout_secs = 10

# Deadline for one request/ack exchange (milliseconds)
exchange_timeout_ms = 10000
"#;

impl PublisherConfig {
    /// Load configuration from the default file and environment
    pub fn load() -> Result<Self, anyhow::Error> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from `path` (if it exists) and environment
    pub fn load_from(path: &Path) -> Result<Self, anyhow::Error> {
        let mut builder = config::Config::builder()
            .set_default("server_addr", default_server_addr())?
            .set_default("tls.insecure_skip_verify", false)?
            .set_default("tls.key_log", false)?
            .set_default("connection.connect_timeout_secs", default_connect_timeout() as i64)?
            .set_default("connection.exchange_timeout_ms", default_exchange_timeout() as i64)?;

        if path.exists() {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("LRT_PUBLISHER")
                .separator("__")
                .try_parsing(true),
        );

        let config: PublisherConfig = builder.build()?.try_deserialize()?;

        Ok(config)
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf, anyhow::Error> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join("lrt-pids");

        Ok(config_dir.join("config.toml"))
    }

    /// Create the default configuration file
    pub fn create_default_config(force: bool) -> Result<PathBuf, anyhow::Error> {
        let path = Self::config_path()?;
        Self::write_default_config(&path, force)?;
        Ok(path)
    }

    fn write_default_config(path: &Path, force: bool) -> Result<(), anyhow::Error> {
        if path.exists() && !force {
            anyhow::bail!(
                "Configuration file already exists at {} (use --force to overwrite)",
                path.display()
            );
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, DEFAULT_CONFIG)?;
        Ok(())
    }

    /// Client TLS settings for the configured display node
    pub fn client_tls(&self) -> TlsConfig {
        TlsConfig {
            server_name: Some(
                self.tls
                    .server_name
                    .clone()
                    .unwrap_or_else(|| host_of(&self.server_addr).to_string()),
            ),
            ca_cert_path: self.tls.ca_cert.clone(),
            insecure_skip_verify: self.tls.insecure_skip_verify,
            key_log: self.tls.key_log,
        }
    }
}

/// Host part of `host:port`, without IPv6 brackets
fn host_of(addr: &str) -> &str {
    let host = match addr.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => addr,
    };
    host.trim_start_matches('[').trim_end_matches(']')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PublisherConfig::load_from(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.server_addr, "localhost:3206");
        assert!(!config.tls.insecure_skip_verify);
        assert_eq!(config.connection.exchange_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_default_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lrt-pids").join("config.toml");

        PublisherConfig::write_default_config(&path, false).unwrap();
        let config = PublisherConfig::load_from(&path).unwrap();

        assert!(config.tls.insecure_skip_verify);
        assert!(!config.tls.key_log);
        assert_eq!(config.connection.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_init_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "server_addr = \"10.0.0.1:3206\"\n").unwrap();

        assert!(PublisherConfig::write_default_config(&path, false).is_err());
        assert_eq!(
            PublisherConfig::load_from(&path).unwrap().server_addr,
            "10.0.0.1:3206"
        );

        PublisherConfig::write_default_config(&path, true).unwrap();
        assert_eq!(
            PublisherConfig::load_from(&path).unwrap().server_addr,
            "localhost:3206"
        );
    }

    #[test]
    fn test_client_tls_server_name() {
        let mut config = PublisherConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        config.server_addr = "pids.station.local:3206".to_string();
        assert_eq!(
            config.client_tls().server_name.as_deref(),
            Some("pids.station.local")
        );

        config.tls.server_name = Some("override.local".to_string());
        assert_eq!(
            config.client_tls().server_name.as_deref(),
            Some("override.local")
        );
    }

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("localhost:3206"), "localhost");
        assert_eq!(host_of("10.0.0.1:3206"), "10.0.0.1");
        assert_eq!(host_of("[::1]:3206"), "::1");
        assert_eq!(host_of("pids.local"), "pids.local");
    }
}
