//! Shared infrastructure for the voxcore crates.
//!
//! - [`logging`]: `tracing-subscriber` setup used by binaries and tests
//! - [`config`]: TOML loading for the serde config structs of the other crates
//! - [`errors`]: the common error type plus component/operation context

pub mod config;
pub mod errors;
pub mod logging;

pub use errors::{Error, ErrorContext, ErrorExt, Result};
pub use logging::{LoggingConfig, setup_logging};
