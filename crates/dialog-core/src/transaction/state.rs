use std::fmt;

use serde::{Deserialize, Serialize};

use super::timer::TransactionTimer;
use crate::errors::{Error, TransportError};

/// Which side of the transaction we are
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionRole {
    /// Client transaction: we sent the request
    Uac,
    /// Server transaction: we received the request
    Uas,
}

impl fmt::Display for TransactionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionRole::Uac => f.write_str("UAC"),
            TransactionRole::Uas => f.write_str("UAS"),
        }
    }
}

/// Transaction states from RFC 3261 section 17.
///
/// `Calling` is only used by INVITE client transactions and `Confirmed` only
/// by INVITE server transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionState {
    Null,
    Calling,
    Trying,
    Proceeding,
    Completed,
    Confirmed,
    Terminated,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionState::Null => "Null",
            TransactionState::Calling => "Calling",
            TransactionState::Trying => "Trying",
            TransactionState::Proceeding => "Proceeding",
            TransactionState::Completed => "Completed",
            TransactionState::Confirmed => "Confirmed",
            TransactionState::Terminated => "Terminated",
        };
        f.write_str(name)
    }
}

/// Why a transaction reached `Terminated`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// Normal end: final response handled and wait timer (if any) expired
    Completed,
    /// B, C, F or H fired
    Timeout(TransactionTimer),
    TransportError(TransportError),
    /// Ended by the TU
    Forced,
}

impl TerminationReason {
    /// The error an application would see for this outcome, if it is a failure
    pub fn as_error(&self) -> Option<Error> {
        match self {
            TerminationReason::Completed | TerminationReason::Forced => None,
            TerminationReason::Timeout(_) => Some(Error::Timeout),
            TerminationReason::TransportError(e) => Some(Error::Transport(e.clone())),
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::Completed => f.write_str("completed"),
            TerminationReason::Timeout(timer) => write!(f, "timer {} expired", timer),
            TerminationReason::TransportError(e) => write!(f, "transport error: {}", e),
            TerminationReason::Forced => f.write_str("terminated by user"),
        }
    }
}
