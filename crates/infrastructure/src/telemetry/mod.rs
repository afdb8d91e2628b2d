//! Logging initialization
//!
//! Installs a `tracing` subscriber writing to stderr, so stdout only carries
//! command output.

mod logging;

pub use logging::{LoggingConfig, TelemetryError, init_logging};
