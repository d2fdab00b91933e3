//! Capture sinks.
//!
//! # Responsibilities
//! - Accept captured byte blocks in emission order
//! - Keep each block contiguous when exchanges run concurrently
//!
//! # Design Decisions
//! - Emission is synchronous; a write failure is logged, never propagated
//! - Blocks are framed with the exchange ID so interleaved exchanges stay
//!   attributable

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::capture::record::CaptureRecord;

/// Destination for captured traffic.
pub trait CaptureSink: Send + Sync {
    fn emit(&self, record: &CaptureRecord);
}

impl<S: CaptureSink + ?Sized> CaptureSink for Arc<S> {
    fn emit(&self, record: &CaptureRecord) {
        (**self).emit(record)
    }
}

/// Where captures go, as named in configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureTarget {
    Stdout,
    Stderr,
    Off,
    File(String),
}

impl CaptureTarget {
    /// `stdout`, `stderr` and `off` are keywords; anything else is a file path.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "" | "stdout" | "-" => CaptureTarget::Stdout,
            "stderr" => CaptureTarget::Stderr,
            "off" | "none" => CaptureTarget::Off,
            path => CaptureTarget::File(path.to_string()),
        }
    }

    /// Open the sink this target names.
    pub fn open(&self) -> io::Result<Arc<dyn CaptureSink>> {
        Ok(match self {
            CaptureTarget::Stdout => Arc::new(StreamSink::new(io::stdout())),
            CaptureTarget::Stderr => Arc::new(StreamSink::new(io::stderr())),
            CaptureTarget::Off => Arc::new(NullSink),
            CaptureTarget::File(path) => Arc::new(StreamSink::file(path)?),
        })
    }
}

/// Writes framed records to any byte stream.
pub struct StreamSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> StreamSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_record(writer: &mut W, record: &CaptureRecord) -> io::Result<()> {
        writeln!(
            writer,
            "________________ {} {} ________________",
            record.exchange, record.direction
        )?;
        writer.write_all(&record.bytes)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }
}

impl StreamSink<std::fs::File> {
    /// Append to `path`, creating it if needed.
    pub fn file(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write + Send> CaptureSink for StreamSink<W> {
    fn emit(&self, record: &CaptureRecord) {
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = Self::write_record(&mut writer, record) {
            tracing::warn!(exchange = %record.exchange, error = %e, "Failed to write capture");
        }
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<CaptureRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<CaptureRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CaptureSink for MemorySink {
    fn emit(&self, record: &CaptureRecord) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl CaptureSink for NullSink {
    fn emit(&self, _record: &CaptureRecord) {}
}
