//! Timers for SIP transactions.
//!
//! # Overview
//!
//! RFC 3261 drives reliability and cleanup of every transaction with a set of
//! named timers. This module provides the pieces the transaction layer uses to
//! run them:
//!
//! - [`TimerHeap`]: a generation-checked min-heap of pending entries
//! - [`TransactionTimer`]: the named timers, A through K
//! - [`TimerSettings`]: T1/T2/T4 and the durations derived from them
//! - [`Clock`]: where the heap gets "now" from
//!
//! ```text
//! ┌──────────────┐ StartTimer/CancelTimer ┌────────────┐  poll()  ┌──────────────┐
//! │  Transaction │───────────────────────▶│  Endpoint  │─────────▶│  TimerHeap   │
//! │ state machine│◀───────────────────────│            │◀─────────│ (key, timer) │
//! └──────────────┘      TimerFired        └────────────┘  due     └──────────────┘
//! ```
//!
//! ## Client Transaction Timers
//! - **Timer A** (INVITE): request retransmission, doubling from T1
//! - **Timer B** (INVITE): transaction timeout, 64*T1
//! - **Timer D** (INVITE): wait for response retransmissions, 32s or 0
//! - **Timer E** (non-INVITE): request retransmission, doubling up to T2
//! - **Timer F** (non-INVITE): transaction timeout, 64*T1
//! - **Timer K** (non-INVITE): wait for response retransmissions, T4 or 0
//!
//! ## Server Transaction Timers
//! - **Timer G** (INVITE): response retransmission, doubling up to T2
//! - **Timer H** (INVITE): wait for ACK, 64*T1
//! - **Timer I** (INVITE): absorb ACK retransmissions, T4 or 0
//! - **Timer J** (non-INVITE): absorb request retransmissions, 64*T1 or 0

pub mod clock;
pub mod heap;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use heap::{TimerCallback, TimerHeap, TimerId};
pub use types::{TimerSettings, TransactionTimer};
