//! Display node configuration

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use lrt_common::notification::AnnouncementTemplates;
use lrt_common::transaction::ServerOptions;
use lrt_common::transport::QuicServerOptions;
use serde::{Deserialize, Serialize};

/// Port display nodes listen on
pub const DEFAULT_PORT: u16 = 3206;

/// Display node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriberConfig {
    /// Address for publisher QUIC connections
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// TLS certificate configuration
    pub tls: TlsConfig,

    /// Concurrency and timeout limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Announcement text
    #[serde(default)]
    pub announcement: AnnouncementConfig,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT))
}

/// TLS certificate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Path to certificate PEM file
    pub cert_path: String,

    /// Path to private key PEM file
    pub key_path: String,
}

/// Concurrency and timeout limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Stream handlers running at once; further streams queue
    #[serde(default = "default_max_concurrent_streams")]
    pub max_concurrent_streams: usize,

    /// Time allowed to read a request and write its ack (milliseconds)
    #[serde(default = "default_stream_timeout_ms")]
    pub stream_timeout_ms: u64,

    /// Open streams a single publisher connection may hold
    #[serde(default = "default_max_concurrent_bidi_streams")]
    pub max_concurrent_bidi_streams: u32,

    /// Idle time before a connection is dropped (seconds)
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

fn default_max_concurrent_streams() -> usize {
    lrt_common::transaction::server::DEFAULT_MAX_CONCURRENT_STREAMS
}

fn default_stream_timeout_ms() -> u64 {
    10_000
}

fn default_max_concurrent_bidi_streams() -> u32 {
    100
}

fn default_idle_timeout_secs() -> u64 {
    90
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_streams: default_max_concurrent_streams(),
            stream_timeout_ms: default_stream_timeout_ms(),
            max_concurrent_bidi_streams: default_max_concurrent_bidi_streams(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

impl LimitsConfig {
    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            max_concurrent_streams: self.max_concurrent_streams,
            stream_timeout: Duration::from_millis(self.stream_timeout_ms),
        }
    }

    pub fn quic_options(&self) -> QuicServerOptions {
        QuicServerOptions {
            max_concurrent_bidi_streams: self.max_concurrent_bidi_streams,
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
        }
    }
}

/// Announcement text; `{destination}` and `{platform}` are substituted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnouncementConfig {
    #[serde(default = "default_platform")]
    pub platform: String,

    #[serde(default = "default_arriving")]
    pub arriving: String,

    #[serde(default = "default_departing")]
    pub departing: String,
}

fn default_platform() -> String {
    AnnouncementTemplates::default().platform
}

fn default_arriving() -> String {
    AnnouncementTemplates::default().arriving
}

fn default_departing() -> String {
    AnnouncementTemplates::default().departing
}

impl Default for AnnouncementConfig {
    fn default() -> Self {
        let templates = AnnouncementTemplates::default();
        Self {
            platform: templates.platform,
            arriving: templates.arriving,
            departing: templates.departing,
        }
    }
}

impl AnnouncementConfig {
    pub fn templates(&self) -> AnnouncementTemplates {
        AnnouncementTemplates {
            platform: self.platform.clone(),
            arriving: self.arriving.clone(),
            departing: self.departing.clone(),
        }
    }
}

impl SubscriberConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        Self::load_with_env(path, Self::environment())
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix("LRT_SUBSCRIBER")
            .separator("__")
            .try_parsing(true)
    }

    /// Layer `env` over the file, or over development defaults if there is none
    fn load_with_env(path: &Path, env: config::Environment) -> anyhow::Result<Self> {
        let builder = if path.exists() {
            config::Config::builder().add_source(config::File::from(path))
        } else {
            tracing::warn!(
                "Configuration file not found at {:?}, using development defaults",
                path
            );
            let defaults = config::Config::try_from(&Self::development_config()?)?;
            config::Config::builder().add_source(defaults)
        };

        let config: SubscriberConfig = builder.add_source(env).build()?.try_deserialize()?;
        Ok(config)
    }

    /// Generate a sample configuration file
    pub fn generate_sample_config() -> String {
        r#"# LRT PIDS Subscriber Configuration
#
# Any value can be overridden from the environment, e.g.
# LRT_SUBSCRIBER__LIMITS__STREAM_TIMEOUT_MS=5000

# Address for publisher QUIC connections
listen_addr = "0.0.0.0:3206"

[tls]
# Path to TLS certificate (PEM format)
cert_path = "/etc/lrt-pids/subscriber.crt"

# Path to TLS private key (PEM format)
key_path = "/etc/lrt-pids/subscriber.key"

[limits]
# Stream handlers running at once; further streams wait for a free slot
max_concurrent_streams = 256

# Time allowed to read one request and write its ack (milliseconds)
stream_timeout_ms = 10000

# Open streams a single publisher connection may hold
max_concurrent_bidi_streams = 100

# Idle time before a connection is dropped (seconds)
idle_timeout_secs = 90

[announcement]
platform = "1"
arriving = "Mohon perhatian, kereta tujuan {destination} akan tiba di Peron {platform}."
departing = "Mohon perhatian, kereta tujuan {destination} akan diberangkatkan dari Peron {platform}."
"#
        .to_string()
    }

    /// Create a development configuration with self-signed certs
    pub fn development_config() -> anyhow::Result<Self> {
        use lrt_common::crypto::generate_self_signed_cert;

        let cert_info = generate_self_signed_cert(
            "lrt-subscriber.local",
            &["localhost".to_string()],
            &[
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(Ipv6Addr::LOCALHOST),
            ],
            30,
        )?;

        let temp_dir = std::env::temp_dir().join("lrt-pids-dev");
        std::fs::create_dir_all(&temp_dir)?;

        let cert_path = temp_dir.join("subscriber.crt");
        let key_path = temp_dir.join("subscriber.key");

        std::fs::write(&cert_path, &cert_info.cert_pem)?;
        std::fs::write(&key_path, &cert_info.key_pem)?;

        tracing::info!("Generated development certificates in {:?}", temp_dir);
        tracing::info!("Certificate fingerprint: {}", cert_info.fingerprint);

        Ok(Self {
            listen_addr: default_listen_addr(),
            tls: TlsConfig {
                cert_path: cert_path.to_string_lossy().to_string(),
                key_path: key_path.to_string_lossy().to_string(),
            },
            limits: LimitsConfig::default(),
            announcement: AnnouncementConfig::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_sample_config_parses() {
        let file = write_config(&SubscriberConfig::generate_sample_config());
        let config = SubscriberConfig::load(file.path()).unwrap();

        assert_eq!(config.listen_addr, default_listen_addr());
        assert_eq!(config.tls.cert_path, "/etc/lrt-pids/subscriber.crt");
        assert_eq!(config.limits.max_concurrent_streams, 256);
        assert_eq!(config.announcement.templates(), AnnouncementTemplates::default());
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let file = write_config(
            r#"
[tls]
cert_path = "a.crt"
key_path = "a.key"
"#,
        );
        let config = SubscriberConfig::load(file.path()).unwrap();

        assert_eq!(config.listen_addr.port(), DEFAULT_PORT);
        assert_eq!(config.limits.stream_timeout_ms, 10_000);
        assert_eq!(config.announcement.platform, "1");
    }

    #[test]
    fn test_limits_and_announcements_override() {
        let file = write_config(
            r#"
listen_addr = "127.0.0.1:4000"

[tls]
cert_path = "a.crt"
key_path = "a.key"

[limits]
max_concurrent_streams = 4
stream_timeout_ms = 250

[announcement]
platform = "2"
arriving = "{destination} tiba di {platform}"
"#,
        );
        let config = SubscriberConfig::load(file.path()).unwrap();

        let options = config.limits.server_options();
        assert_eq!(options.max_concurrent_streams, 4);
        assert_eq!(options.stream_timeout, Duration::from_millis(250));
        assert_eq!(config.limits.quic_options().max_concurrent_bidi_streams, 100);

        let templates = config.announcement.templates();
        assert_eq!(templates.platform, "2");
        assert_eq!(templates.arriving, "{destination} tiba di {platform}");
        assert_eq!(templates.departing, AnnouncementTemplates::default().departing);
    }

    #[test]
    fn test_missing_tls_section_rejected() {
        let file = write_config("listen_addr = \"127.0.0.1:4000\"\n");
        assert!(SubscriberConfig::load(file.path()).is_err());
    }

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<config::Map<String, String>>();
        SubscriberConfig::environment().source(Some(vars))
    }

    #[test]
    fn test_env_overrides_file() {
        let file = write_config(
            r#"
[tls]
cert_path = "a.crt"
key_path = "a.key"
"#,
        );
        let config = SubscriberConfig::load_with_env(
            file.path(),
            env(&[("LRT_SUBSCRIBER__LIMITS__STREAM_TIMEOUT_MS", "500")]),
        )
        .unwrap();

        assert_eq!(config.limits.stream_timeout_ms, 500);
        assert_eq!(config.tls.cert_path, "a.crt");
    }

    #[test]
    fn test_env_overrides_development_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SubscriberConfig::load_with_env(
            &dir.path().join("absent.toml"),
            env(&[
                ("LRT_SUBSCRIBER__LISTEN_ADDR", "127.0.0.1:4321"),
                ("LRT_SUBSCRIBER__ANNOUNCEMENT__PLATFORM", "3"),
            ]),
        )
        .unwrap();

        assert_eq!(config.listen_addr, "127.0.0.1:4321".parse::<SocketAddr>().unwrap());
        assert_eq!(config.announcement.platform, "3");
        assert!(std::fs::metadata(&config.tls.cert_path).is_ok());
        assert_eq!(config.limits.max_concurrent_streams, default_max_concurrent_streams());
    }

    #[test]
    fn test_development_config_writes_certs() {
        let config = SubscriberConfig::development_config().unwrap();

        let cert = std::fs::read_to_string(&config.tls.cert_path).unwrap();
        let key = std::fs::read_to_string(&config.tls.key_path).unwrap();
        assert!(cert.contains("BEGIN CERTIFICATE"));
        assert!(key.contains("PRIVATE KEY"));
    }
}
