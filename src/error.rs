//! Error types for the capture proxy.
//!
//! Every way a single exchange can fail is a [`ProxyError`] variant. Each
//! variant knows the HTTP status the caller receives, so the dispatch path
//! can always finish a request with an explicit response.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Boxed error returned by upstream transports.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced while resolving, rewriting or forwarding a request.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// The host table source could not be read.
    #[error("Host table unavailable at {path}: {source}")]
    SourceUnavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Neither the host table nor the fallback resolver knew the host.
    #[error("Host not found: {hostname}")]
    HostNotFound { hostname: String },

    /// The selected backend is the proxy itself.
    #[error("Loop detected: {backend} resolves to this proxy")]
    LoopDetected { backend: String },

    /// The outbound URI could not be assembled from the rewrite.
    #[error("Invalid upstream target: {target}")]
    InvalidTarget { target: String },

    /// Sending to the backend failed at the network or protocol layer.
    #[error("{0}")]
    Upstream(#[source] BoxError),

    /// A message body could not be buffered for capture.
    #[error("Failed to buffer body: {0}")]
    Capture(#[source] axum::Error),

    /// Listener certificate or key could not be loaded.
    #[error("TLS setup failed: {0}")]
    Tls(#[source] std::io::Error),
}

impl ProxyError {
    /// Creates an upstream transport error from any error type.
    pub fn upstream(err: impl Into<BoxError>) -> Self {
        Self::Upstream(err.into())
    }

    /// HTTP status written back to the caller for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::HostNotFound { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::LoopDetected { .. } => StatusCode::LOOP_DETECTED,
            ProxyError::SourceUnavailable { .. } | ProxyError::Tls(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ProxyError::InvalidTarget { .. }
            | ProxyError::Upstream(_)
            | ProxyError::Capture(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("{}\n", self),
        )
            .into_response()
    }
}

/// Result type alias using ProxyError.
pub type Result<T> = std::result::Result<T, ProxyError>;
