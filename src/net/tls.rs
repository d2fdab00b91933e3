//! TLS configuration and certificate loading.

use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

use crate::error::{ProxyError, Result};

/// Load TLS configuration from certificate and key files.
pub async fn load_tls_config(
    cert_path: impl AsRef<Path>,
    key_path: impl AsRef<Path>,
) -> Result<RustlsConfig> {
    let cert_path = cert_path.as_ref();
    let key_path = key_path.as_ref();

    // Basic validation
    if !cert_path.exists() {
        return Err(ProxyError::Tls(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Certificate file not found: {:?}", cert_path),
        )));
    }
    if !key_path.exists() {
        return Err(ProxyError::Tls(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Private key file not found: {:?}", key_path),
        )));
    }

    install_crypto_provider();

    let config = RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(ProxyError::Tls)?;

    tracing::debug!(cert = %cert_path.display(), "TLS material loaded");
    Ok(config)
}

/// More than one rustls backend is linked in; pick one process-wide.
fn install_crypto_provider() {
    // Already installed is fine.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}
