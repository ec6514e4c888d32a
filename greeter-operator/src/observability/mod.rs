//! Structured logging for the operator.
//!
//! Logging format is controlled via `GREETER_LOG_FORMAT`:
//! - `json` - Structured JSON output (default when stdout is not a TTY)
//! - `pretty` - Human-readable colored output (default for TTY)
//! - `compact` - Compact single-line format

mod config;
mod tracing_setup;

pub use config::{LogFormat, TracingConfig, TracingConfigBuilder};
pub use tracing_setup::init_tracing;
