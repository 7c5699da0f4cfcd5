use thiserror::Error;

/// Result alias for infrastructure operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while setting up logging or loading configuration
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O failure while reading a configuration file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The global subscriber could not be installed
    #[error("Logging error: {0}")]
    Logging(String),

    /// An error annotated with an [`ErrorContext`](super::ErrorContext)
    #[error("{message} [{context}]")]
    WithContext {
        message: String,
        context: super::ErrorContext,
    },
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
