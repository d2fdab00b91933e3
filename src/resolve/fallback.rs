//! Fallback name resolution.
//!
//! Used only when the static host table has no entry for a host. One
//! recursive A query goes to the configured resolver endpoint; the first
//! answer decides the result.
//!
//! # Design Decisions
//! - Exactly one attempt, no retries
//! - Alias records are followed to depth 1: the alias target is returned as-is
//! - Failures are never surfaced; they read as "not found"

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use futures_util::future::BoxFuture;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{Name, RData, RecordType};
use tokio::net::UdpSocket;

use crate::error::BoxError;

/// Default port for the resolver endpoint.
pub const DNS_PORT: u16 = 53;

/// Largest UDP reply accepted.
const MAX_DATAGRAM: usize = 4096;

/// A secondary lookup consulted after the host table.
///
/// Implementations must not fail observably: any problem yields `None`.
pub trait Fallback: Send + Sync {
    fn lookup<'a>(&'a self, hostname: &'a str) -> BoxFuture<'a, Option<String>>;
}

/// Fallback that never resolves anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFallback;

impl Fallback for NoFallback {
    fn lookup<'a>(&'a self, _hostname: &'a str) -> BoxFuture<'a, Option<String>> {
        Box::pin(async { None })
    }
}

/// Single-shot DNS client against one resolver endpoint.
#[derive(Debug, Clone)]
pub struct DnsFallback {
    endpoint: String,
    timeout: Duration,
}

impl DnsFallback {
    /// `server` may be a hostname or IP literal, with or without a port.
    pub fn new(server: &str, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint_with_port(server),
            timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn query(&self, hostname: &str) -> Result<Option<String>, BoxError> {
        let server = tokio::net::lookup_host(self.endpoint.as_str())
            .await?
            .next()
            .ok_or("resolver endpoint did not resolve")?;

        let unspecified = if server.is_ipv4() {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        } else {
            IpAddr::V6(Ipv6Addr::UNSPECIFIED)
        };
        let socket = UdpSocket::bind(SocketAddr::new(unspecified, 0)).await?;
        socket.connect(server).await?;

        let id: u16 = rand::random();
        let request = build_query(hostname, id)?;
        socket.send(&request).await?;

        let mut buf = vec![0u8; MAX_DATAGRAM];
        let len = tokio::time::timeout(self.timeout, socket.recv(&mut buf)).await??;
        let response = Message::from_vec(&buf[..len])?;

        if response.id() != id {
            return Err("reply id does not match query".into());
        }
        if response.response_code() != ResponseCode::NoError {
            tracing::debug!(
                hostname = %hostname,
                rcode = %response.response_code(),
                "Resolver returned non-success code"
            );
            return Ok(None);
        }

        Ok(first_answer(&response))
    }
}

impl Fallback for DnsFallback {
    fn lookup<'a>(&'a self, hostname: &'a str) -> BoxFuture<'a, Option<String>> {
        Box::pin(async move {
            match self.query(hostname).await {
                Ok(answer) => {
                    tracing::debug!(
                        hostname = %hostname,
                        server = %self.endpoint,
                        answer = ?answer,
                        "Fallback lookup finished"
                    );
                    answer
                }
                Err(e) => {
                    tracing::warn!(
                        hostname = %hostname,
                        server = %self.endpoint,
                        error = %e,
                        "Fallback lookup failed"
                    );
                    None
                }
            }
        })
    }
}

fn build_query(hostname: &str, id: u16) -> Result<Vec<u8>, BoxError> {
    let mut name = Name::from_ascii(hostname)?;
    name.set_fqdn(true);

    let mut message = Message::new();
    message
        .set_id(id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true)
        .add_query(Query::query(name, RecordType::A));
    Ok(message.to_vec()?)
}

/// Only the first answer counts: A yields its address, CNAME its target.
fn first_answer(response: &Message) -> Option<String> {
    let record = response.answers().first()?;
    match record.data() {
        RData::A(a) => Some(a.to_string()),
        RData::CNAME(cname) => Some(cname.0.to_string().trim_end_matches('.').to_string()),
        _ => None,
    }
}

/// Append the default DNS port unless one is already present.
fn endpoint_with_port(server: &str) -> String {
    let server = server.trim();
    if let Ok(ip) = server.parse::<IpAddr>() {
        return SocketAddr::new(ip, DNS_PORT).to_string();
    }
    if server.parse::<SocketAddr>().is_ok() {
        return server.to_string();
    }
    match server.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.parse::<u16>().is_ok() => {
            server.to_string()
        }
        _ => format!("{}:{}", server, DNS_PORT),
    }
}
