use thiserror::Error;

/// Result alias for message-model operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised when a parsed message lacks something the core needs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A mandatory header is absent
    #[error("Missing mandatory header: {0}")]
    MissingHeader(&'static str),

    /// A URI could not be interpreted
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    /// A method token is empty or contains illegal characters
    #[error("Invalid method: {0}")]
    InvalidMethod(String),
}
