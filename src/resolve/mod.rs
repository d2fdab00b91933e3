//! Backend resolution subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound hostname
//!     → hosts.rs (fresh read of the host table, first match)
//!     → fallback.rs (one DNS query, only on a table miss)
//!     → selector.rs (exactly one backend, or HostNotFound)
//!     → LoopGuard (reject backends that are this proxy)
//! ```
//!
//! # Design Decisions
//! - Nothing is cached across requests; each request resolves from scratch
//! - The fallback is a trait so lookups can be replaced in tests

pub mod fallback;
pub mod hosts;
pub mod selector;

pub use fallback::{DnsFallback, Fallback, NoFallback};
pub use hosts::{HostEntry, HostTable, HostsFile};
pub use selector::{BackendSelector, LoopGuard};
