//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate listener layout (ports present, no overlap, TLS material)
//! - Validate resolution settings
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no listener ports configured")]
    NoListeners,

    #[error("port {0} is listed as both plaintext and secured")]
    PortInBothLists(u16),

    #[error("secured ports require listener.tls cert_path and key_path")]
    MissingTls,

    #[error("resolution.hosts_path is empty")]
    EmptyHostsPath,

    #[error("resolution.dns_server is empty")]
    EmptyDnsServer,

    #[error("resolution.dns_timeout_secs must be greater than zero")]
    ZeroDnsTimeout,
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let listener = &config.listener;

    if listener.http_ports.is_empty() && listener.https_ports.is_empty() {
        errors.push(ValidationError::NoListeners);
    }

    for port in &listener.https_ports {
        if listener.http_ports.contains(port) {
            errors.push(ValidationError::PortInBothLists(*port));
        }
    }

    if !listener.https_ports.is_empty() {
        let complete = listener
            .tls
            .as_ref()
            .is_some_and(|tls| !tls.cert_path.is_empty() && !tls.key_path.is_empty());
        if !complete {
            errors.push(ValidationError::MissingTls);
        }
    }

    if config.resolution.hosts_path.trim().is_empty() {
        errors.push(ValidationError::EmptyHostsPath);
    }
    if config.resolution.dns_server.trim().is_empty() {
        errors.push(ValidationError::EmptyDnsServer);
    }
    if config.resolution.dns_timeout_secs == 0 {
        errors.push(ValidationError::ZeroDnsTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
