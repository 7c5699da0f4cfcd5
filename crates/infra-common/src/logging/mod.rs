//! Logging setup on top of `tracing-subscriber`

pub mod setup;

pub use setup::{LoggingConfig, parse_log_level, setup_logging};
