//! Error types for media-core

use thiserror::Error;

/// Failures of the jitter buffer API.
///
/// Missing and incomplete frames are not errors; they are ordinary
/// [`FrameResult`](crate::buffer::FrameResult) values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JitterBufferError {
    #[error("bad argument: {0}")]
    BadArgument(String),
}

impl JitterBufferError {
    pub fn bad_argument(msg: impl Into<String>) -> Self {
        JitterBufferError::BadArgument(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, JitterBufferError>;
