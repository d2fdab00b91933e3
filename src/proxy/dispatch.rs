//! Per-request orchestration.
//!
//! # Flow
//! ```text
//! inbound request
//!     → mint ExchangeId
//!     → buffer body, capture request
//!     → director (resolve backend, loop guard)
//!     → engine (rewrite, send through the capturing transport)
//! ```
//!
//! Resolution failures end the request with an explicit error response and
//! no outbound send.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::{IntoResponse, Response};

use crate::capture::dump::dump_request;
use crate::capture::{CaptureRecord, CaptureSink, ExchangeId};
use crate::error::ProxyError;
use crate::proxy::director::Director;
use crate::proxy::engine::ReverseProxy;

/// Shared by every listener.
pub struct Dispatcher {
    director: Director,
    proxy: ReverseProxy,
    sink: Arc<dyn CaptureSink>,
}

impl Dispatcher {
    pub fn new(director: Director, proxy: ReverseProxy, sink: Arc<dyn CaptureSink>) -> Self {
        Self {
            director,
            proxy,
            sink,
        }
    }

    /// Handle one inbound request end to end.
    ///
    /// `secure` tells whether the request arrived over TLS.
    pub async fn handle(
        &self,
        request: Request<Body>,
        secure: bool,
        client_addr: Option<SocketAddr>,
    ) -> Response {
        let exchange = ExchangeId::next();
        let (parts, body) = request.into_parts();

        let body = match axum::body::to_bytes(body, usize::MAX).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(exchange = %exchange, error = %e, "Failed to read inbound body");
                return ProxyError::Capture(e).into_response();
            }
        };
        self.sink
            .emit(&CaptureRecord::request(exchange, dump_request(&parts, &body)));

        let host = inbound_host(&parts);
        let ctx = match self.director.direct(&host, secure, exchange).await {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::warn!(exchange = %exchange, host = %host, error = %e, "Request not forwarded");
                return e.into_response();
            }
        };

        self.proxy
            .forward(&ctx, Request::from_parts(parts, Body::from(body)), client_addr)
            .await
    }
}

/// Host header, else the authority of an absolute request target.
fn inbound_host(parts: &axum::http::request::Parts) -> String {
    parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| parts.uri.authority().map(|a| a.to_string()))
        .unwrap_or_default()
}
