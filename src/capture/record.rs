//! Capture records and exchange correlation.

use std::sync::atomic::{AtomicU64, Ordering};

use axum::body::Bytes;

/// Global counter for exchange IDs.
/// Relaxed ordering is enough: only uniqueness matters.
static EXCHANGE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Ties the request capture of one exchange to its response capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExchangeId(u64);

impl ExchangeId {
    /// Mint a new unique exchange ID.
    pub fn next() -> Self {
        Self(EXCHANGE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which half of the exchange a record holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Request,
    Response,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Request => f.write_str("request"),
            Direction::Response => f.write_str("response"),
        }
    }
}

/// One verbatim block of captured traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRecord {
    pub exchange: ExchangeId,
    pub direction: Direction,
    pub bytes: Bytes,
}

impl CaptureRecord {
    pub fn request(exchange: ExchangeId, bytes: Bytes) -> Self {
        Self {
            exchange,
            direction: Direction::Request,
            bytes,
        }
    }

    pub fn response(exchange: ExchangeId, bytes: Bytes) -> Self {
        Self {
            exchange,
            direction: Direction::Response,
            bytes,
        }
    }
}
