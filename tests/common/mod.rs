//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::io::Write;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hickory_proto::op::{Message, MessageType, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{RData, Record};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};

use capture_proxy::capture::{CapturingTransport, MemorySink};
use capture_proxy::config::UpstreamConfig;
use capture_proxy::lifecycle::Shutdown;
use capture_proxy::proxy::{Director, Dispatcher, ProxyServer, ReverseProxy, UpstreamClient};
use capture_proxy::resolve::{BackendSelector, Fallback, HostsFile, LoopGuard, NoFallback};
use capture_proxy::ProxyConfig;

/// Counts connections accepted by a mock backend.
pub type Hits = Arc<AtomicUsize>;

pub fn hits(counter: &Hits) -> usize {
    counter.load(Ordering::SeqCst)
}

/// Start a backend that echoes the request body and reports the Host and
/// request target it saw in `x-echo-host` / `x-echo-target`.
pub async fn start_echo_backend() -> (SocketAddr, Hits) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let counter: Hits = Arc::new(AtomicUsize::new(0));
    let hits = counter.clone();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            hits.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(echo(socket));
        }
    });

    (addr, counter)
}

async fn echo(mut socket: TcpStream) {
    let mut received = Vec::new();
    let mut buf = vec![0u8; 64 * 1024];

    let head_end = loop {
        let n = match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        received.extend_from_slice(&buf[..n]);
        if let Some(pos) = received.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&received[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let target = lines
        .next()
        .and_then(|l| l.split(' ').nth(1))
        .unwrap_or("")
        .to_string();

    let mut host = String::new();
    let mut content_length = 0usize;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            match name.trim().to_ascii_lowercase().as_str() {
                "host" => host = value.trim().to_string(),
                "content-length" => content_length = value.trim().parse().unwrap_or(0),
                _ => {}
            }
        }
    }

    let mut body = received[head_end..].to_vec();
    while body.len() < content_length {
        let n = match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        body.extend_from_slice(&buf[..n]);
    }

    let head = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nX-Echo-Host: {}\r\nX-Echo-Target: {}\r\nConnection: close\r\n\r\n",
        body.len(),
        host,
        target
    );
    let _ = socket.write_all(head.as_bytes()).await;
    let _ = socket.write_all(&body).await;
    let _ = socket.shutdown().await;
}

/// A port nothing listens on.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// Start a DNS server answering A queries from `records`; other names get
/// NXDOMAIN.
pub async fn start_fake_dns(records: &[(&str, [u8; 4])]) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let records: Vec<(String, [u8; 4])> = records
        .iter()
        .map(|(name, ip)| (format!("{}.", name.trim_end_matches('.')), *ip))
        .collect();

    tokio::spawn(async move {
        let mut buf = vec![0u8; 512];
        while let Ok((len, peer)) = socket.recv_from(&mut buf).await {
            let Ok(query) = Message::from_vec(&buf[..len]) else {
                continue;
            };

            let mut reply = Message::new();
            reply
                .set_id(query.id())
                .set_message_type(MessageType::Response)
                .set_recursion_desired(query.recursion_desired())
                .set_recursion_available(true)
                .add_queries(query.queries().to_vec());

            let asked = query
                .queries()
                .first()
                .map(|q| q.name().to_ascii().to_lowercase())
                .unwrap_or_default();
            match records.iter().find(|(name, _)| *name == asked) {
                Some((_, [a, b, c, d])) => {
                    reply.add_answer(Record::from_rdata(
                        query.queries()[0].name().clone(),
                        60,
                        RData::A(A::new(*a, *b, *c, *d)),
                    ));
                }
                None => {
                    reply.set_response_code(ResponseCode::NXDomain);
                }
            }

            if let Ok(bytes) = reply.to_vec() {
                let _ = socket.send_to(&bytes, peer).await;
            }
        }
    });

    addr
}

/// Write a host table to a temporary file.
pub fn hosts_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

/// A running proxy wired to an in-memory capture sink.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub sink: Arc<MemorySink>,
    pub shutdown: Shutdown,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start a plaintext proxy on an ephemeral port.
///
/// Backends on 127.0.0.1 are reachable because the loop guard only knows
/// `proxy.self`.
pub async fn start_proxy(hosts: &tempfile::NamedTempFile, fallback: Option<Arc<dyn Fallback>>) -> TestProxy {
    let sink = Arc::new(MemorySink::new());

    let client = UpstreamClient::new(&UpstreamConfig {
        use_system_proxy: false,
        connect_timeout_secs: 5,
        ..UpstreamConfig::default()
    })
    .unwrap();
    let transport = CapturingTransport::new(client, sink.clone());

    let fallback: Arc<dyn Fallback> = match fallback {
        Some(fallback) => fallback,
        None => Arc::new(NoFallback),
    };
    let director = Director::new(
        BackendSelector::new(HostsFile::new(hosts.path()), fallback),
        LoopGuard::new(["proxy.self"]),
    );
    let dispatcher = Dispatcher::new(director, ReverseProxy::new(Arc::new(transport)), sink.clone());
    let server = ProxyServer::with_dispatcher(Arc::new(dispatcher), ProxyConfig::default());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.serve_plain(listener, rx).await;
    });

    TestProxy { addr, sink, shutdown }
}

/// HTTP client that never goes through a system proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}
