//! Capture Proxy
//!
//! A transparent HTTP/HTTPS proxy that records the traffic it forwards.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ listener (http / https)
//!                   │
//!                   ▼
//!               dispatcher ──▶ capture sink (request)
//!                   │
//!                   ▼
//!               director ──▶ host table ──▶ DNS fallback
//!                   │
//!                   ▼
//!               engine ──▶ capturing transport ──▶ backend
//!                   │              │
//!     Client ◀──────┘              └──▶ capture sink (response)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use capture_proxy::config::load_config;
use capture_proxy::lifecycle::shutdown_on_signal;
use capture_proxy::observability::init_logging;
use capture_proxy::{ProxyServer, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "capture-proxy", version, about = "Transparent capturing HTTP/HTTPS proxy")]
struct Args {
    /// TOML configuration file.
    #[arg(short, long, env = "CONFIG_PATH")]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Args {
    fn level_override(&self) -> Option<&'static str> {
        if self.quiet {
            return Some("error");
        }
        match self.verbose {
            0 => None,
            1 => Some("debug"),
            _ => Some("trace"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    init_logging(&config.observability, args.level_override())?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "capture-proxy starting");
    tracing::info!(
        http_ports = ?config.listener.http_ports,
        https_ports = ?config.listener.https_ports,
        hosts_path = %config.resolution.hosts_path,
        dns_server = %config.resolution.dns_server,
        capture = %config.capture.target,
        "Configuration loaded"
    );

    let server = ProxyServer::new(config)?;

    let shutdown = Arc::new(Shutdown::new());
    let signal = shutdown.clone();
    tokio::spawn(async move { shutdown_on_signal(&signal).await });

    server.run(&shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
