//! Reverse-proxy engine.
//!
//! # Responsibilities
//! - Apply the director's rewrite to the outbound request
//! - Strip hop-by-hop headers in both directions
//! - Append the caller's address to X-Forwarded-For
//! - Turn every transport failure into an explicit error response

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request};
use axum::response::{IntoResponse, Response};

use crate::capture::Transport;
use crate::proxy::director::ProxyContext;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Headers that describe one connection and are never forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Forwards directed requests through a [`Transport`].
#[derive(Clone)]
pub struct ReverseProxy {
    transport: Arc<dyn Transport>,
}

impl ReverseProxy {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Send `request` to the backend chosen in `ctx`.
    ///
    /// Always produces a response: the backend's on success, a Bad Gateway
    /// carrying the error text otherwise.
    pub async fn forward(
        &self,
        ctx: &ProxyContext,
        request: Request<Body>,
        client_addr: Option<SocketAddr>,
    ) -> Response {
        let (mut parts, body) = request.into_parts();

        parts.uri = match ctx.outbound_uri(&parts.uri) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::warn!(exchange = %ctx.exchange, error = %e, "Cannot build outbound request");
                return e.into_response();
            }
        };

        strip_hop_by_hop(&mut parts.headers);
        if let Some(addr) = client_addr {
            append_forwarded_for(&mut parts.headers, addr);
        }
        if let Ok(host) = HeaderValue::from_str(&ctx.original_host) {
            parts.headers.insert(header::HOST, host);
        }
        parts.extensions.insert(ctx.exchange);

        tracing::info!(
            exchange = %ctx.exchange,
            host = %ctx.original_host,
            target = %parts.uri,
            "Proxying to"
        );

        match self.transport.send(Request::from_parts(parts, body)).await {
            Ok(mut response) => {
                strip_hop_by_hop(response.headers_mut());
                tracing::debug!(
                    exchange = %ctx.exchange,
                    status = %response.status(),
                    "Upstream responded"
                );
                response
            }
            Err(e) => {
                tracing::warn!(
                    exchange = %ctx.exchange,
                    backend = %ctx.backend,
                    error = %e,
                    "Upstream request failed"
                );
                e.into_response()
            }
        }
    }
}

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, addr: SocketAddr) {
    let client = addr.ip().to_string();
    let prior: Vec<&str> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();

    let value = if prior.is_empty() {
        client
    } else {
        format!("{}, {}", prior.join(", "), client)
    };

    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ExchangeId;
    use crate::error::{ProxyError, Result};
    use axum::http::StatusCode;
    use futures_util::future::BoxFuture;
    use std::sync::Mutex;

    /// Records the last request it saw and answers with a fixed response.
    #[derive(Default)]
    struct RecordingTransport {
        seen: Mutex<Option<(String, HeaderMap, Option<ExchangeId>)>>,
        fail: bool,
    }

    impl Transport for RecordingTransport {
        fn send(&self, request: Request<Body>) -> BoxFuture<'_, Result<axum::http::Response<Body>>> {
            *self.seen.lock().unwrap() = Some((
                request.uri().to_string(),
                request.headers().clone(),
                request.extensions().get::<ExchangeId>().copied(),
            ));
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    return Err(ProxyError::upstream("connect: connection refused"));
                }
                Ok(axum::http::Response::builder()
                    .status(StatusCode::OK)
                    .header("connection", "close, x-internal")
                    .header("x-internal", "secret")
                    .header("transfer-encoding", "chunked")
                    .header("x-backend", "yes")
                    .body(Body::empty())
                    .unwrap())
            })
        }
    }

    fn context(secure: bool) -> ProxyContext {
        ProxyContext {
            exchange: ExchangeId::next(),
            original_host: "api.internal:8443".into(),
            hostname: "api.internal".into(),
            port: Some("8443".into()),
            secure,
            backend: "10.0.0.5".into(),
        }
    }

    fn inbound() -> Request<Body> {
        Request::builder()
            .uri("/path?x=1")
            .header("host", "api.internal:8443")
            .header("connection", "keep-alive, x-hop")
            .header("x-hop", "drop me")
            .header("keep-alive", "timeout=5")
            .header("proxy-authorization", "Basic abc")
            .header("x-forwarded-for", "192.0.2.1")
            .header("x-keep", "kept")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_outbound_request_is_rewritten() {
        let transport = Arc::new(RecordingTransport::default());
        let proxy = ReverseProxy::new(transport.clone());
        let ctx = context(true);

        let response = proxy
            .forward(&ctx, inbound(), Some("198.51.100.7:40000".parse().unwrap()))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let (uri, headers, exchange) = transport.seen.lock().unwrap().take().unwrap();
        assert_eq!(uri, "https://10.0.0.5:8443/path?x=1");
        assert_eq!(headers["host"], "api.internal:8443");
        assert_eq!(headers["x-forwarded-for"], "192.0.2.1, 198.51.100.7");
        assert_eq!(headers["x-keep"], "kept");
        for gone in ["connection", "x-hop", "keep-alive", "proxy-authorization"] {
            assert!(!headers.contains_key(gone), "{} should be stripped", gone);
        }
        assert_eq!(exchange, Some(ctx.exchange));
    }

    #[tokio::test]
    async fn test_response_hop_by_hop_is_stripped() {
        let proxy = ReverseProxy::new(Arc::new(RecordingTransport::default()));
        let response = proxy.forward(&context(false), inbound(), None).await;

        let headers = response.headers();
        assert!(!headers.contains_key("connection"));
        assert!(!headers.contains_key("x-internal"));
        assert!(!headers.contains_key("transfer-encoding"));
        assert_eq!(headers["x-backend"], "yes");
    }

    #[tokio::test]
    async fn test_transport_failure_is_bad_gateway() {
        let transport = Arc::new(RecordingTransport {
            fail: true,
            ..Default::default()
        });
        let proxy = ReverseProxy::new(transport);

        let response = proxy.forward(&context(false), inbound(), None).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"connect: connection refused\n");
    }

    #[test]
    fn test_forwarded_for_without_prior_value() {
        let mut headers = HeaderMap::new();
        append_forwarded_for(&mut headers, "[2001:db8::1]:443".parse().unwrap());
        assert_eq!(headers["x-forwarded-for"], "2001:db8::1");
    }
}
