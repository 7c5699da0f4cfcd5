//! Core dialog types
//!
//! - [`DialogId`]: opaque handle into the endpoint's dialog registry
//! - [`DialogKey`]: Call-ID plus tags, used to match messages to dialogs
//! - [`Dialog`]: RFC 3261 section 12 dialog state
//! - [`DialogState`]: Null, Early, Established, Terminated
//!
//! ## Dialog Lifecycle
//!
//! ```text
//! Null ──1xx+tag──▶ Early ──2xx──▶ Established ──BYE──▶ Terminated
//!   │                 │
//!   └─────2xx─────────┴──300-699──────────────────────▶ Terminated
//! ```

pub mod dialog_id;
pub mod dialog_impl;
pub mod dialog_state;

pub use dialog_id::{DialogId, DialogKey};
pub use dialog_impl::Dialog;
pub use dialog_state::DialogState;
