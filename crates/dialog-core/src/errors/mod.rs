//! Error types for dialog-core
//!
//! [`Error`] covers the transaction table, timer heap and dialog layer.
//! [`TransportError`] is what the transport collaborator reports from `send`;
//! inside a transaction it is a termination cause, not a failure of the call
//! that triggered the send.

pub mod types;

pub use types::{Error, Result, TransportError};
