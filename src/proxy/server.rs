//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the dispatcher once from configuration
//! - Create one Axum Router per listener kind (plaintext, secured)
//! - Bind every configured port and serve until shutdown
//!
//! # Design Decisions
//! - All listeners share one `Arc<Dispatcher>`
//! - A failure to bind or load TLS material stops startup
//! - Secured listeners drain with a bounded grace period

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tower_http::trace::TraceLayer;

use crate::capture::{CaptureTarget, CapturingTransport};
use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::lifecycle::Shutdown;
use crate::net::tls::load_tls_config;
use crate::proxy::client::UpstreamClient;
use crate::proxy::director::Director;
use crate::proxy::dispatch::Dispatcher;
use crate::proxy::engine::ReverseProxy;
use crate::resolve::{BackendSelector, DnsFallback, HostsFile, LoopGuard};

/// How long secured listeners wait for in-flight requests on shutdown.
const TLS_DRAIN_GRACE: Duration = Duration::from_secs(10);

/// Errors that prevent the server from starting or keep it from running.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Cannot open capture target {target}: {source}")]
    Capture {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot build upstream client: {0}")]
    Client(#[source] ProxyError),

    #[error(transparent)]
    Tls(ProxyError),

    #[error("Cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Listener failed: {0}")]
    Serve(#[source] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub secure: bool,
}

/// HTTP server for the capture proxy.
pub struct ProxyServer {
    dispatcher: Arc<Dispatcher>,
    config: ProxyConfig,
}

impl ProxyServer {
    /// Create a new server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let target = CaptureTarget::parse(&config.capture.target);
        let sink = target.open().map_err(|source| ServerError::Capture {
            target: config.capture.target.clone(),
            source,
        })?;

        let client = UpstreamClient::new(&config.upstream).map_err(ServerError::Client)?;
        let transport = CapturingTransport::new(client, sink.clone());

        let resolution = &config.resolution;
        let hosts = HostsFile::new(&resolution.hosts_path);
        let fallback = DnsFallback::new(&resolution.dns_server, resolution.dns_timeout());
        tracing::info!(
            hosts = %hosts.path().display(),
            dns = %fallback.endpoint(),
            "Resolution configured"
        );
        let selector = BackendSelector::new(hosts, Arc::new(fallback));
        let director = Director::new(selector, LoopGuard::new(&resolution.loop_identities));

        let dispatcher = Dispatcher::new(director, ReverseProxy::new(Arc::new(transport)), sink);

        Ok(Self {
            dispatcher: Arc::new(dispatcher),
            config,
        })
    }

    /// Create a server around an already assembled dispatcher.
    pub fn with_dispatcher(dispatcher: Arc<Dispatcher>, config: ProxyConfig) -> Self {
        Self { dispatcher, config }
    }

    /// Router for one listener kind.
    pub fn router(&self, secure: bool) -> Router {
        build_router(AppState {
            dispatcher: self.dispatcher.clone(),
            secure,
        })
    }

    /// Serve plaintext HTTP on an already bound listener until `shutdown` fires.
    pub async fn serve_plain(
        &self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP listener starting");

        let app = self
            .router(false)
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(wait_for(shutdown))
            .await?;

        tracing::info!(address = %addr, "HTTP listener stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr` until `shutdown` fires.
    pub async fn serve_tls(
        &self,
        addr: SocketAddr,
        tls: RustlsConfig,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS listener starting");

        let handle = Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            wait_for(shutdown).await;
            drain.graceful_shutdown(Some(TLS_DRAIN_GRACE));
        });

        let app = self
            .router(true)
            .into_make_service_with_connect_info::<SocketAddr>();

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(app)
            .await?;

        tracing::info!(address = %addr, "HTTPS listener stopped");
        Ok(())
    }

    /// Bind every configured port and serve until `shutdown` is triggered.
    pub async fn run(self, shutdown: &Shutdown) -> Result<(), ServerError> {
        let server = Arc::new(self);
        let listener = &server.config.listener;
        let mut tasks = JoinSet::new();

        for port in &listener.http_ports {
            let addr = format!("{}:{}", listener.bind_host, port);
            let bound = TcpListener::bind(&addr)
                .await
                .map_err(|source| ServerError::Bind { addr, source })?;

            let server = server.clone();
            let rx = shutdown.subscribe();
            tasks.spawn(async move { server.serve_plain(bound, rx).await });
        }

        if !listener.https_ports.is_empty() {
            let tls = listener.tls.clone().unwrap_or_default();
            let rustls = load_tls_config(&tls.cert_path, &tls.key_path)
                .await
                .map_err(ServerError::Tls)?;

            for port in &listener.https_ports {
                let addr = format!("{}:{}", listener.bind_host, port);
                let resolved = resolve_addr(&addr)
                    .await
                    .map_err(|source| ServerError::Bind { addr, source })?;

                let server = server.clone();
                let rustls = rustls.clone();
                let rx = shutdown.subscribe();
                tasks.spawn(async move { server.serve_tls(resolved, rustls, rx).await });
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    shutdown.trigger();
                    return Err(ServerError::Serve(e));
                }
                Err(e) => {
                    shutdown.trigger();
                    return Err(ServerError::Serve(std::io::Error::other(e)));
                }
            }
        }

        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/{*path}", any(proxy_handler))
        .route("/", any(proxy_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Hands every request to the shared dispatcher.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let client_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    state
        .dispatcher
        .handle(request, state.secure, client_addr)
        .await
}

async fn resolve_addr(addr: &str) -> Result<SocketAddr, std::io::Error> {
    tokio::net::lookup_host(addr).await?.next().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            format!("{} did not resolve", addr),
        )
    })
}

async fn wait_for(mut shutdown: broadcast::Receiver<()>) {
    // A closed channel means the coordinator is gone; stop as well.
    let _ = shutdown.recv().await;
}
