//! # Transaction
//!
//! A [`Transaction`] is a sans-IO state machine: [`Transaction::process_event`]
//! takes one [`TransactionEvent`] and returns the [`TransactionAction`]s the
//! runtime must carry out (send this, arm that timer, hand this response to
//! the TU). The [`Endpoint`](crate::manager::Endpoint) calls it with the
//! transaction's lock held and applies the actions before releasing the lock,
//! so timer changes are never observable apart from the state change that
//! caused them.
//!
//! The per-role logic lives in `client.rs` (RFC 3261 sections 17.1.1 and
//! 17.1.2) and `server.rs` (sections 17.2.1 and 17.2.2).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use tracing::{debug, trace, warn};
use voxcore_sip_core::{Method, Request, Response, SipMessage, StatusCode};

use super::key::TransactionKey;
use super::state::{TerminationReason, TransactionRole, TransactionState};
use super::timer::{TimerId, TimerSettings, TransactionTimer};
use crate::dialog::DialogId;
use crate::errors::{Error, Result, TransportError};

/// Input to a transaction
#[derive(Debug, Clone)]
pub enum TransactionEvent {
    /// The TU sends a message through the transaction: the request of a
    /// client transaction, or a response of a server transaction
    Send(SipMessage),
    /// A message matched to this transaction arrived
    IncomingMessage(SipMessage),
    TimerFired(TransactionTimer),
    /// Sending failed; terminates the transaction from any state
    TransportError(TransportError),
    /// The TU ends the transaction, reporting `status`
    Terminate(StatusCode),
}

/// Output of a transaction step, applied by the runtime in order
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionAction {
    Transmit(SipMessage),
    StartTimer(TransactionTimer, Duration),
    CancelTimer(TransactionTimer),
    /// Pass a message up to the TU
    Deliver(SipMessage),
    StateChanged {
        from: TransactionState,
        to: TransactionState,
    },
}

#[derive(Debug)]
pub struct Transaction {
    key: TransactionKey,
    role: TransactionRole,
    method: Method,
    pub(super) state: TransactionState,
    pub(super) request: Request,
    destination: SocketAddr,
    pub(super) reliable: bool,
    pub(super) settings: TimerSettings,
    pub(super) proxy_mode: bool,
    pub(super) retransmit_count: u32,
    pub(super) retransmit_interval: Duration,
    pub(super) last_sent: Option<SipMessage>,
    pub(super) last_response: Option<Response>,
    pub(super) status_code: Option<StatusCode>,
    pub(super) termination: Option<TerminationReason>,
    dialog: Option<DialogId>,
    /// Heap handles of the armed timers, maintained by the endpoint
    pub(crate) timers: HashMap<TransactionTimer, TimerId>,
}

impl Transaction {
    /// Client transaction for `request`, in Calling (INVITE) or Trying.
    ///
    /// Nothing is sent until the request is passed in with
    /// [`TransactionEvent::Send`].
    pub fn new_uac(
        request: Request,
        destination: SocketAddr,
        reliable: bool,
        settings: TimerSettings,
    ) -> Result<Self> {
        if request.method == Method::Ack {
            return Err(Error::bad_argument("ACK is never sent through a client transaction"));
        }
        let cseq = request.headers.cseq()?;
        if cseq.method != request.method {
            return Err(Error::bad_argument(format!(
                "CSeq method {} does not match request method {}",
                cseq.method, request.method
            )));
        }
        let key = TransactionKey::for_request(&request, TransactionRole::Uac)?;
        let state = if request.method == Method::Invite {
            TransactionState::Calling
        } else {
            TransactionState::Trying
        };
        Ok(Self::new(key, TransactionRole::Uac, state, request, destination, reliable, settings))
    }

    /// Server transaction for a request received from `source`, in
    /// Proceeding (INVITE) or Trying
    pub fn new_uas(
        request: Request,
        source: SocketAddr,
        reliable: bool,
        settings: TimerSettings,
    ) -> Result<Self> {
        if request.method == Method::Ack {
            return Err(Error::bad_argument("ACK never creates a server transaction"));
        }
        request.headers.cseq()?;
        let key = TransactionKey::for_request(&request, TransactionRole::Uas)?;
        let state = if request.method == Method::Invite {
            TransactionState::Proceeding
        } else {
            TransactionState::Trying
        };
        Ok(Self::new(key, TransactionRole::Uas, state, request, source, reliable, settings))
    }

    fn new(
        key: TransactionKey,
        role: TransactionRole,
        state: TransactionState,
        request: Request,
        destination: SocketAddr,
        reliable: bool,
        settings: TimerSettings,
    ) -> Self {
        debug!(key = %key, role = %role, method = %request.method, state = %state, "transaction created");
        Transaction {
            key,
            role,
            method: request.method.clone(),
            state,
            request,
            destination,
            reliable,
            settings,
            proxy_mode: false,
            retransmit_count: 0,
            retransmit_interval: settings.t1,
            last_sent: None,
            last_response: None,
            status_code: None,
            termination: None,
            dialog: None,
            timers: HashMap::new(),
        }
    }

    /// Arm Timer C on INVITE client transactions
    pub fn with_proxy_mode(mut self, enabled: bool) -> Self {
        self.proxy_mode = enabled;
        self
    }

    pub fn key(&self) -> &TransactionKey {
        &self.key
    }

    pub fn role(&self) -> TransactionRole {
        self.role
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// The request that created the transaction
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Where requests (UAC) or responses (UAS) are sent
    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    pub fn is_reliable(&self) -> bool {
        self.reliable
    }

    pub fn status_code(&self) -> Option<StatusCode> {
        self.status_code
    }

    pub fn termination_reason(&self) -> Option<&TerminationReason> {
        self.termination.as_ref()
    }

    pub fn retransmit_count(&self) -> u32 {
        self.retransmit_count
    }

    pub fn retransmit_interval(&self) -> Duration {
        self.retransmit_interval
    }

    pub fn last_sent(&self) -> Option<&SipMessage> {
        self.last_sent.as_ref()
    }

    /// Last response received (UAC) or sent (UAS)
    pub fn last_response(&self) -> Option<&Response> {
        self.last_response.as_ref()
    }

    pub fn dialog(&self) -> Option<DialogId> {
        self.dialog
    }

    pub(crate) fn set_dialog(&mut self, dialog: Option<DialogId>) {
        self.dialog = dialog;
    }

    pub fn is_terminated(&self) -> bool {
        self.state == TransactionState::Terminated
    }

    /// Run one event through the state machine.
    ///
    /// Exactly one transition (possibly to the same state) happens per call.
    /// Events that do not apply to the current state are ignored, except that
    /// sending in the wrong state is an error.
    pub fn process_event(&mut self, event: TransactionEvent) -> Result<Vec<TransactionAction>> {
        if self.state == TransactionState::Terminated {
            return match event {
                TransactionEvent::Send(_) => Err(Error::invalid_state(format!(
                    "transaction {} is terminated",
                    self.key
                ))),
                other => Ok(self.ignore(&other)),
            };
        }

        match event {
            TransactionEvent::TransportError(error) => {
                warn!(key = %self.key, state = %self.state, error = %error, "transport error, terminating transaction");
                Ok(self.terminate(
                    TerminationReason::TransportError(error),
                    Some(StatusCode::SERVICE_UNAVAILABLE),
                ))
            }
            TransactionEvent::Terminate(status) => {
                debug!(key = %self.key, status = %status, "transaction terminated by TU");
                Ok(self.terminate(TerminationReason::Forced, Some(status)))
            }
            event => match (self.role, self.method == Method::Invite) {
                (TransactionRole::Uac, true) => self.client_invite(event),
                (TransactionRole::Uac, false) => self.client_non_invite(event),
                (TransactionRole::Uas, true) => self.server_invite(event),
                (TransactionRole::Uas, false) => self.server_non_invite(event),
            },
        }
    }

    pub(super) fn transition(&mut self, to: TransactionState, actions: &mut Vec<TransactionAction>) {
        if self.state == to {
            return;
        }
        debug!(key = %self.key, from = %self.state, to = %to, "transaction state changed");
        actions.push(TransactionAction::StateChanged { from: self.state, to });
        self.state = to;
    }

    pub(super) fn finish(&mut self, actions: &mut Vec<TransactionAction>) {
        self.termination = Some(TerminationReason::Completed);
        self.transition(TransactionState::Terminated, actions);
    }

    pub(super) fn terminate(
        &mut self,
        reason: TerminationReason,
        status: Option<StatusCode>,
    ) -> Vec<TransactionAction> {
        let mut actions = Vec::new();
        if let Some(status) = status {
            self.status_code = Some(status);
        }
        self.termination = Some(reason);
        self.transition(TransactionState::Terminated, &mut actions);
        actions
    }

    pub(super) fn timeout(&mut self, timer: TransactionTimer) -> Vec<TransactionAction> {
        warn!(key = %self.key, timer = %timer, state = %self.state, "transaction timed out");
        self.terminate(TerminationReason::Timeout(timer), Some(StatusCode::REQUEST_TIMEOUT))
    }

    pub(super) fn transmit(&mut self, message: SipMessage, actions: &mut Vec<TransactionAction>) {
        self.last_sent = Some(message.clone());
        actions.push(TransactionAction::Transmit(message));
    }

    /// Send the last transmitted message again
    pub(super) fn retransmit(&mut self, actions: &mut Vec<TransactionAction>) {
        if let Some(message) = &self.last_sent {
            self.retransmit_count += 1;
            trace!(key = %self.key, count = self.retransmit_count, message = %message.summary(), "retransmitting");
            actions.push(TransactionAction::Transmit(message.clone()));
        }
    }

    /// Start a retransmission timer at T1
    pub(super) fn arm_retransmission(&mut self, timer: TransactionTimer, actions: &mut Vec<TransactionAction>) {
        if self.reliable {
            return;
        }
        self.retransmit_interval = self.settings.t1;
        actions.push(TransactionAction::StartTimer(timer, self.retransmit_interval));
    }

    pub(super) fn start(&self, timer: TransactionTimer, actions: &mut Vec<TransactionAction>) {
        actions.push(TransactionAction::StartTimer(
            timer,
            self.settings.duration(timer, self.reliable),
        ));
    }

    pub(super) fn ignore(&self, event: &TransactionEvent) -> Vec<TransactionAction> {
        trace!(key = %self.key, state = %self.state, event = ?event_name(event), "event ignored");
        Vec::new()
    }

    pub(super) fn wrong_state(&self, what: &str) -> Error {
        Error::invalid_state(format!("cannot {} in state {} ({})", what, self.state, self.key))
    }
}

fn event_name(event: &TransactionEvent) -> String {
    match event {
        TransactionEvent::Send(m) => format!("send {}", m.summary()),
        TransactionEvent::IncomingMessage(m) => format!("incoming {}", m.summary()),
        TransactionEvent::TimerFired(t) => format!("timer {}", t),
        TransactionEvent::TransportError(e) => format!("transport error {}", e),
        TransactionEvent::Terminate(s) => format!("terminate {}", s),
    }
}
