//! Observer traits through which the application hears about transactions
//! and dialogs.
//!
//! Observers are called from whatever thread drove the event (the receive
//! path, `poll_timers`, or an API call), after every transaction and dialog
//! lock has been released. They may call back into the
//! [`Endpoint`](crate::manager::Endpoint) freely but should not block.

use serde::{Deserialize, Serialize};
use voxcore_sip_core::{Method, Request, Response, StatusCode};

use crate::dialog::{Dialog, DialogId};
use crate::transaction::{TerminationReason, TransactionKey, TransactionRole, TransactionState};

/// What drove a transaction state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateChangeCause {
    /// The TU sent a request or response
    Sent,
    /// A message arrived from the network
    Received,
    /// A transaction timer fired
    Timer,
    TransportError,
    /// The TU terminated the transaction
    Forced,
}

/// One transaction state change, or a message delivered without a state
/// change (e.g. a second provisional response)
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionStateChange {
    pub key: TransactionKey,
    pub role: TransactionRole,
    pub method: Method,
    pub previous: TransactionState,
    pub current: TransactionState,
    /// Last status sent or received; 408 after a timeout, 503 after a
    /// transport error
    pub status_code: Option<StatusCode>,
    pub cause: StateChangeCause,
    /// Set once the transaction reached Terminated
    pub reason: Option<TerminationReason>,
    pub dialog: Option<DialogId>,
    /// Response received from the network that drove this change
    pub response: Option<Response>,
}

impl TransactionStateChange {
    pub fn is_terminated(&self) -> bool {
        self.current == TransactionState::Terminated
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.reason, Some(TerminationReason::Timeout(_)))
    }
}

/// Transaction-level notifications
pub trait TransactionObserver: Send + Sync {
    fn on_transaction_state_changed(&self, change: &TransactionStateChange);

    /// A request arrived outside any dialog and created a server transaction
    fn on_rx_request(&self, _key: &TransactionKey, _request: &Request) {}
}

/// Dialog-level notifications
pub trait DialogObserver: Send + Sync {
    fn on_dialog_state_changed(&self, _dialog: &Dialog) {}

    /// An in-dialog request passed the CSeq check. `transaction` is `None`
    /// for an ACK to a 2xx, which has no transaction of its own.
    fn on_rx_request_in_dialog(
        &self,
        _dialog: &Dialog,
        _transaction: Option<&TransactionKey>,
        _request: &Request,
    ) {
    }
}
