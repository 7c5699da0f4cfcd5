//! Notifications to the application layer

pub mod observer;

pub use observer::{DialogObserver, StateChangeCause, TransactionObserver, TransactionStateChange};
