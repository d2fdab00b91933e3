//! Request direction.
//!
//! Decides where one inbound request goes and rewrites its target. Holds no
//! state between requests.

use std::net::Ipv6Addr;

use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::Uri;

use crate::capture::ExchangeId;
use crate::error::{ProxyError, Result};
use crate::resolve::{BackendSelector, LoopGuard};

/// Everything decided about one exchange before it is forwarded.
#[derive(Debug, Clone)]
pub struct ProxyContext {
    /// Correlation token shared by both captures.
    pub exchange: ExchangeId,

    /// The inbound Host value, sent upstream unchanged.
    pub original_host: String,

    /// Hostname part of the inbound Host.
    pub hostname: String,

    /// Port part of the inbound Host, if one was given.
    pub port: Option<String>,

    /// Whether the inbound connection completed a TLS handshake.
    pub secure: bool,

    /// Address chosen by the backend selector.
    pub backend: String,
}

impl ProxyContext {
    pub fn scheme(&self) -> Scheme {
        if self.secure {
            Scheme::HTTPS
        } else {
            Scheme::HTTP
        }
    }

    /// Backend plus the original port, when there was one.
    pub fn target_authority(&self) -> String {
        let host = if self.backend.parse::<Ipv6Addr>().is_ok() {
            format!("[{}]", self.backend)
        } else {
            self.backend.clone()
        };
        match &self.port {
            Some(port) => format!("{}:{}", host, port),
            None => host,
        }
    }

    /// Rewrite `inbound` to point at the backend. Path and query are kept.
    pub fn outbound_uri(&self, inbound: &Uri) -> Result<Uri> {
        let authority = self.target_authority();
        let invalid = || ProxyError::InvalidTarget {
            target: format!("{}://{}", self.scheme(), authority),
        };

        let authority: Authority = authority.parse().map_err(|_| invalid())?;
        let path_and_query = inbound
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));

        Uri::builder()
            .scheme(self.scheme())
            .authority(authority)
            .path_and_query(path_and_query)
            .build()
            .map_err(|_| invalid())
    }
}

/// Split a Host value on its first colon.
///
/// Bracketed IPv6 literals keep their colons: `[::1]:8443` gives `::1` and
/// `8443`.
pub fn split_host(host: &str) -> (String, Option<String>) {
    let host = host.trim();

    if let Some(rest) = host.strip_prefix('[') {
        if let Some((inner, tail)) = rest.split_once(']') {
            let port = tail
                .strip_prefix(':')
                .filter(|p| !p.is_empty())
                .map(str::to_string);
            return (inner.to_string(), port);
        }
    }

    match host.split_once(':') {
        Some((name, port)) if !port.is_empty() => (name.to_string(), Some(port.to_string())),
        Some((name, _)) => (name.to_string(), None),
        None => (host.to_string(), None),
    }
}

/// Resolves inbound hosts to backends and guards against self-proxying.
#[derive(Clone)]
pub struct Director {
    selector: BackendSelector,
    loop_guard: LoopGuard,
}

impl Director {
    pub fn new(selector: BackendSelector, loop_guard: LoopGuard) -> Self {
        Self {
            selector,
            loop_guard,
        }
    }

    /// Pick the backend for `host` and build the exchange context.
    ///
    /// Fails before anything is sent when the host cannot be resolved or
    /// resolves to this proxy.
    pub async fn direct(&self, host: &str, secure: bool, exchange: ExchangeId) -> Result<ProxyContext> {
        let (hostname, port) = split_host(host);

        let backend = self.selector.select(&hostname).await?;
        self.loop_guard.check(&backend)?;

        Ok(ProxyContext {
            exchange,
            original_host: host.to_string(),
            hostname,
            port,
            secure,
            backend,
        })
    }
}
