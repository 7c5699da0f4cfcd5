//! TOML loading for the serde configuration structs of the other crates.
//!
//! ```rust
//! use serde::Deserialize;
//! use voxcore_infra_common::config::from_toml_str;
//!
//! #[derive(Deserialize)]
//! struct Settings { poll_batch: usize }
//!
//! let settings: Settings = from_toml_str("poll_batch = 16").unwrap();
//! assert_eq!(settings.poll_batch, 16);
//! ```

use crate::errors::{Error, ErrorContext, ErrorExt, Result};
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::debug;

/// Parse a configuration value from TOML text
pub fn from_toml_str<T: DeserializeOwned>(text: &str) -> Result<T> {
    Ok(toml::from_str(text)?)
}

/// Read and parse a TOML configuration file
pub fn load_toml<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    debug!(path = %path.display(), "loading configuration");

    let text = std::fs::read_to_string(path)
        .map_err(|e| e.context(ErrorContext::new("config", "read").in_file(path)))?;

    from_toml_str(&text).map_err(|e| match e {
        Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}
