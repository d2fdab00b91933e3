//! Transparent capturing HTTP/HTTPS proxy.
//!
//! Routes each request by its Host header: a hosts-file table first, a DNS
//! query second. Both halves of every exchange are written verbatim to a
//! capture sink.

pub mod capture;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod resolve;

pub use config::schema::ProxyConfig;
pub use error::{ProxyError, Result};
pub use lifecycle::Shutdown;
pub use proxy::ProxyServer;
