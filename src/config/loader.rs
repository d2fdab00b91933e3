//! Configuration loading from disk and the environment.
//!
//! Precedence, lowest to highest: built-in defaults, TOML file, environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{ProxyConfig, TlsConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value in {var}: {message}")]
    Env { var: String, message: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, apply environment
/// overrides, then validate.
pub fn load_config(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ProxyConfig::default(),
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Override fields from environment variables read through `lookup`.
///
/// Empty values are treated as unset.
pub fn apply_env_overrides<F>(config: &mut ProxyConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

    if let Some(value) = get("HTTP_PORTS") {
        config.listener.http_ports = parse_ports("HTTP_PORTS", &value)?;
    }
    if let Some(value) = get("HTTPS_PORTS") {
        config.listener.https_ports = parse_ports("HTTPS_PORTS", &value)?;
    }

    let cert = get("CERT_FILE");
    let key = get("KEY_FILE");
    if cert.is_some() || key.is_some() {
        let tls = config.listener.tls.get_or_insert_with(TlsConfig::default);
        if let Some(cert) = cert {
            tls.cert_path = cert;
        }
        if let Some(key) = key {
            tls.key_path = key;
        }
    }

    if let Some(value) = get("HOSTS_PATH") {
        config.resolution.hosts_path = value;
    }
    if let Some(value) = get("DNS_SERVER") {
        config.resolution.dns_server = value.trim().to_string();
    }
    if let Some(value) = get("CAPTURE_TARGET") {
        config.capture.target = value;
    }

    Ok(())
}

/// Parse a comma separated port list, skipping empty items.
fn parse_ports(var: &str, value: &str) -> Result<Vec<u16>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<u16>().map_err(|e| ConfigError::Env {
                var: var.to_string(),
                message: format!("'{}': {}", item, e),
            })
        })
        .collect()
}
