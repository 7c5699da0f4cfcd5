use std::net::SocketAddr;

use thiserror::Error;

use crate::dialog::DialogId;

/// Result alias used across dialog-core
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a [`Transport`](crate::transport::Transport)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("destination unreachable: {0}")]
    Unreachable(SocketAddr),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("transport closed")]
    Closed,
}

/// Errors surfaced by the transaction and dialog layers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Sending failed; fatal to the transaction involved
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Timer B, F or H expired
    #[error("Transaction timed out")]
    Timeout,

    /// Malformed input or misuse, e.g. a message whose transaction key
    /// cannot be computed
    #[error("Bad argument: {0}")]
    BadArgument(String),

    /// In-dialog request whose CSeq does not advance the remote sequence
    #[error("CSeq {received} is not greater than last accepted {last}")]
    CSeqTooOld { received: u32, last: u32 },

    /// Bounded timer heap or transaction table is full
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(&'static str),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Dialog not found: {0}")]
    DialogNotFound(DialogId),

    /// The requested operation is not valid in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    pub fn bad_argument(msg: impl Into<String>) -> Self {
        Error::BadArgument(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }
}

impl From<voxcore_sip_core::Error> for Error {
    fn from(err: voxcore_sip_core::Error) -> Self {
        Error::BadArgument(err.to_string())
    }
}
