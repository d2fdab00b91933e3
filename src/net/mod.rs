//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Secured listener startup
//!     → tls.rs (certificate + key → RustlsConfig)
//!     → proxy::server (axum-server TLS acceptor)
//! ```
//!
//! # Design Decisions
//! - One certificate/key pair serves every secured port
//! - Plaintext listeners need nothing from this layer

pub mod tls;

pub use tls::load_tls_config;
