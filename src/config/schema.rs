//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the capture proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listening ports and TLS material.
    pub listener: ListenerConfig,

    /// Host table and fallback resolver settings.
    pub resolution: ResolutionConfig,

    /// Outbound client behavior.
    pub upstream: UpstreamConfig,

    /// Where traffic captures go.
    pub capture: CaptureConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface every listener binds to.
    pub bind_host: String,

    /// Plaintext ports.
    pub http_ports: Vec<u16>,

    /// Secured ports. Require `tls`.
    pub https_ports: Vec<u16>,

    /// Certificate and key shared by all secured ports.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            http_ports: vec![8080],
            https_ports: Vec::new(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Name resolution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Hosts-file formatted table, re-read on every lookup.
    pub hosts_path: String,

    /// Fallback resolver endpoint, `host` or `host:port`.
    pub dns_server: String,

    /// Timeout for one fallback query.
    pub dns_timeout_secs: u64,

    /// Backend values that mean "this proxy".
    pub loop_identities: Vec<String>,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            hosts_path: "/etc/hosts".to_string(),
            dns_server: "127.0.0.1".to_string(),
            dns_timeout_secs: 2,
            loop_identities: vec!["127.0.0.1".to_string(), "localhost".to_string()],
        }
    }
}

impl ResolutionConfig {
    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.dns_timeout_secs)
    }
}

/// Outbound client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Skip backend certificate validation.
    pub accept_invalid_certs: bool,

    /// TCP connect timeout.
    pub connect_timeout_secs: u64,

    /// How long idle pooled connections are kept.
    pub pool_idle_timeout_secs: u64,

    /// Honor HTTP_PROXY / HTTPS_PROXY / NO_PROXY.
    pub use_system_proxy: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            accept_invalid_certs: true,
            connect_timeout_secs: 30,
            pool_idle_timeout_secs: 90,
            use_system_proxy: true,
        }
    }
}

/// Capture output configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// `stdout`, `stderr`, `off`, or a file path.
    pub target: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            target: "stdout".to_string(),
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}
