//! Underlying upstream client.
//!
//! # Responsibilities
//! - Send a fully rewritten request to the backend
//! - Stream the backend's response back as an axum body
//!
//! # Design Decisions
//! - Backend certificates are not validated unless configured otherwise
//! - Redirects are returned to the caller, never followed
//! - The Host header of the outbound request is sent as given

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use futures_util::future::BoxFuture;

use crate::capture::Transport;
use crate::config::UpstreamConfig;
use crate::error::{ProxyError, Result};

/// reqwest-backed [`Transport`].
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs));

        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }

        let client = builder.build().map_err(ProxyError::upstream)?;
        Ok(Self { client })
    }

    async fn execute(&self, request: Request<Body>) -> Result<Response<Body>> {
        let (parts, body) = request.into_parts();

        // The inbound body is already buffered for capture.
        let body = axum::body::to_bytes(body, usize::MAX)
            .await
            .map_err(ProxyError::Capture)?;

        let upstream = self
            .client
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers)
            .body(body)
            .send()
            .await
            .map_err(ProxyError::upstream)?;

        let mut builder = Response::builder()
            .status(upstream.status())
            .version(upstream.version());
        if let Some(headers) = builder.headers_mut() {
            *headers = upstream.headers().clone();
        }

        builder
            .body(Body::from_stream(upstream.bytes_stream()))
            .map_err(ProxyError::upstream)
    }
}

impl Transport for UpstreamClient {
    fn send(&self, request: Request<Body>) -> BoxFuture<'_, Result<Response<Body>>> {
        Box::pin(self.execute(request))
    }
}
