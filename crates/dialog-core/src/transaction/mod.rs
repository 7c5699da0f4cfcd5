//! # SIP transaction layer
//!
//! RFC 3261 section 17 client and server transactions for INVITE and
//! non-INVITE requests.
//!
//! ```text
//!                     INVITE client                     non-INVITE client
//!  send ─▶ Calling ─1xx─▶ Proceeding          send ─▶ Trying ─1xx─▶ Proceeding
//!             │  \            │                          │            │
//!            2xx  300-699   300-699 (ACK)           final│       final│
//!             │      \        ▼                          ▼            ▼
//!             │       └──▶ Completed ─D─▶ Terminated   Completed ─K─▶ Terminated
//!             └──────────────────────────▶ Terminated
//! ```
//!
//! The state machine itself ([`Transaction`]) performs no I/O. The
//! [`Endpoint`](crate::manager::Endpoint) feeds it events from the network,
//! the timer heap and the TU, and carries out the [`TransactionAction`]s it
//! returns.

pub mod client;
pub mod core;
pub mod key;
pub mod server;
pub mod state;
pub mod table;
pub mod timer;

pub use self::core::{Transaction, TransactionAction, TransactionEvent};
pub use key::TransactionKey;
pub use state::{TerminationReason, TransactionRole, TransactionState};
pub use table::{SharedTransaction, TransactionGuard, TransactionTable};
