//! Traffic capture subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request  → dump.rs (render) → sink.rs (request record)
//! Outbound send    → transport.rs (buffer full body)
//!                  → dump.rs (render) → sink.rs (response record)
//!                  → replayable response back to the proxy engine
//! ```
//!
//! # Design Decisions
//! - Both halves of an exchange carry the same `ExchangeId`
//! - Records are complete or absent, never partial

pub mod dump;
pub mod record;
pub mod sink;
pub mod transport;

pub use record::{CaptureRecord, Direction, ExchangeId};
pub use sink::{CaptureSink, CaptureTarget, MemorySink, NullSink, StreamSink};
pub use transport::{CapturingTransport, Transport};
