//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, stderr)
//!
//! Captured traffic is not logging; it goes through capture::CaptureSink.
//! ```
//!
//! # Design Decisions
//! - Structured fields (`exchange`, `host`, `backend`, `error`) on every event
//! - The exchange ID links log lines to capture blocks

pub mod logging;

pub use logging::init_logging;
