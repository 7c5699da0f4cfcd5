//! The endpoint: transaction table, timer heap, dialog registry and the
//! operations that tie them to a transport.
//!
//! All state changes of a transaction happen under its own lock. Effects on
//! dialogs and observers are collected while the lock is held and applied
//! after it is released, so observers may call back into the endpoint.

pub mod core;
pub mod dialog_ops;
pub mod runner;
pub mod transaction_ops;

pub use self::core::{Endpoint, SharedDialog};
pub use runner::{run_endpoint, InboundMessage};
