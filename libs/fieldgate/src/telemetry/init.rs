//! Global subscriber installation

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use super::config::{LogFormat, LoggingConfig};

#[derive(thiserror::Error, Debug)]
pub enum TelemetryError {
    #[error("invalid log filter `{directive}`: {source}")]
    InvalidFilter {
        directive: String,
        #[source]
        source: ParseError,
    },
}

/// Install the global `tracing` subscriber described by `cfg`.
///
/// `RUST_LOG` wins over `cfg.level` when it is set and valid. Returns `Ok(false)` when a
/// global subscriber is already installed; the existing one is left untouched.
///
/// # Errors
/// `TelemetryError::InvalidFilter` when `cfg.level` is not a valid `EnvFilter` directive.
pub fn init_logging(cfg: &LoggingConfig) -> Result<bool, TelemetryError> {
    let filter = build_filter(cfg)?;
    let registry = tracing_subscriber::registry().with(filter);
    let installed = match cfg.format {
        LogFormat::Plain => registry
            .with(fmt::layer().with_ansi(cfg.ansi).with_target(true))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true).with_span_list(false))
            .try_init(),
    };
    if installed.is_err() {
        tracing::debug!("global subscriber already installed, logging config ignored");
        return Ok(false);
    }
    tracing::info!(level = %cfg.level, format = ?cfg.format, "logging initialized");
    Ok(true)
}

fn build_filter(cfg: &LoggingConfig) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&cfg.level).map_err(|source| TelemetryError::InvalidFilter {
        directive: cfg.level.clone(),
        source,
    })
}
