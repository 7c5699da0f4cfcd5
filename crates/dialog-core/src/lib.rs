//! # voxcore-dialog-core
//!
//! RFC 3261 transaction and dialog layers for a SIP endpoint.
//!
//! The crate is organised around a single [`Endpoint`](manager::Endpoint):
//!
//! - [`transaction`]: the four transaction state machines (INVITE and
//!   non-INVITE, client and server), the transaction table and the
//!   generation-checked timer heap that drives retransmissions and timeouts
//! - [`dialog`]: dialog state, CSeq bookkeeping, route sets and request
//!   construction within a dialog
//! - [`manager`]: the endpoint tying both layers to a [`Transport`](transport::Transport),
//!   plus an async driver loop
//! - [`events`]: observer traits for transaction and dialog notifications
//!
//! ## Driving an endpoint
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio::sync::{mpsc, watch};
//! use voxcore_dialog_core::prelude::*;
//! use voxcore_dialog_core::testing::MockTransport;
//!
//! # async fn demo() {
//! let endpoint = Arc::new(Endpoint::new(EndpointConfig::default(), Arc::new(MockTransport::udp())));
//! let (_inbound_tx, inbound_rx) = mpsc::channel::<InboundMessage>(256);
//! let (_stop_tx, stop_rx) = watch::channel(false);
//! tokio::spawn(run_endpoint(endpoint.clone(), inbound_rx, stop_rx));
//! # }
//! ```

pub mod config;
pub mod dialog;
pub mod errors;
pub mod events;
pub mod manager;
pub mod transaction;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::EndpointConfig;
pub use dialog::{Dialog, DialogId, DialogKey, DialogState};
pub use errors::{Error, Result, TransportError};
pub use events::{DialogObserver, StateChangeCause, TransactionObserver, TransactionStateChange};
pub use manager::{run_endpoint, Endpoint, InboundMessage, SharedDialog};
pub use transaction::{
    TerminationReason, Transaction, TransactionKey, TransactionRole, TransactionState,
};
pub use transport::{Transport, TransportProtocol};

pub mod prelude {
    pub use crate::config::{EndpointConfig, TimerSettings};
    pub use crate::dialog::{Dialog, DialogId, DialogKey, DialogState};
    pub use crate::errors::{Error, Result, TransportError};
    pub use crate::events::{DialogObserver, TransactionObserver, TransactionStateChange};
    pub use crate::manager::{run_endpoint, Endpoint, InboundMessage};
    pub use crate::transaction::{TransactionKey, TransactionRole, TransactionState};
    pub use crate::transport::{Transport, TransportProtocol};
}
