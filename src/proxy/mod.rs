//! Proxy subsystem.
//!
//! # Data Flow
//! ```text
//! server.rs (plaintext + TLS listeners, one router each)
//!     → dispatch.rs (capture request, orchestrate)
//!     → director.rs (host split, backend selection, loop guard)
//!     → engine.rs (rewrite, hop-by-hop, X-Forwarded-For)
//!     → capture::CapturingTransport
//!     → client.rs (reqwest, to the backend)
//! ```

pub mod client;
pub mod director;
pub mod dispatch;
pub mod engine;
pub mod server;

pub use client::UpstreamClient;
pub use director::{split_host, Director, ProxyContext};
pub use dispatch::Dispatcher;
pub use engine::ReverseProxy;
pub use server::{AppState, ProxyServer, ServerError};
