//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Pick the level from `RUST_LOG`, the CLI, or configuration
//!
//! # Design Decisions
//! - Log lines go to stderr; stdout belongs to the capture sink by default
//! - Compact format for terminals, JSON for machine parsing
//! - Dependency noise is capped at `warn` unless `RUST_LOG` says otherwise

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter,
};

use crate::config::{LogFormat, ObservabilityConfig};

/// Install the global subscriber.
///
/// `level_override` wins over the configured level; `RUST_LOG` wins over both.
pub fn init_logging(
    config: &ObservabilityConfig,
    level_override: Option<&str>,
) -> Result<(), TryInitError> {
    let level = normalize_level(level_override.unwrap_or(&config.log_level));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn",
            level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
    }
}

/// Map a level name onto a filter directive, defaulting to `info`.
pub fn normalize_level(level: &str) -> &'static str {
    match level.trim().to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" | "warning" => "warn",
        "error" => "error",
        "off" => "off",
        _ => "info",
    }
}
