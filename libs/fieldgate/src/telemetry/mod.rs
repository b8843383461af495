//! Logging bootstrap
//!
//! Libraries only emit `tracing` events; binaries call [`init_logging`] once at start-up.

pub mod config;
pub mod init;

pub use config::{LogFormat, LoggingConfig};
pub use init::{TelemetryError, init_logging};
