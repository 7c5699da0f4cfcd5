//! The endpoint: owner of the transaction table, the timer heap, the dialog
//! registry and the observers.
//!
//! Every transaction event goes through [`Endpoint::run_event`], which runs
//! the state machine with the transaction locked and applies its actions
//! (transmit, arm or cancel timers) before the lock is released. What the
//! application and the dialog layer need to hear about is collected in an
//! [`Outcome`] and handled by [`Endpoint::finish`] once no transaction lock
//! is held, so observers can call back into the endpoint without
//! re-entering a lock.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};
use voxcore_sip_core::{generate_branch, Response, SipMessage, StatusCode, Via};

use crate::config::EndpointConfig;
use crate::dialog::{Dialog, DialogId, DialogKey};
use crate::errors::{Error, Result, TransportError};
use crate::events::{DialogObserver, StateChangeCause, TransactionObserver, TransactionStateChange};
use crate::transaction::timer::{Clock, SystemClock, TimerHeap, TransactionTimer};
use crate::transaction::{
    Transaction, TransactionAction, TransactionEvent, TransactionKey, TransactionState,
    TransactionTable,
};
use crate::transport::Transport;

pub type SharedDialog = Arc<Mutex<Dialog>>;

/// Payload of a transaction timer in the heap
#[derive(Debug, Clone)]
pub(crate) struct TimerEvent {
    pub key: TransactionKey,
    pub timer: TransactionTimer,
}

/// Everything a locked transaction step produced that must be handled after
/// the lock is released
#[derive(Debug, Default)]
pub(crate) struct Outcome {
    pub changes: Vec<TransactionStateChange>,
    /// Responses passed up by client transactions
    pub delivered: Vec<Response>,
    /// Responses sent through server transactions
    pub sent: Vec<Response>,
    pub dialog: Option<DialogId>,
    pub terminated: bool,
    pub transport_error: Option<TransportError>,
    pub error: Option<Error>,
}

/// A SIP endpoint: transaction layer plus dialog layer over one transport.
///
/// Share it as `Arc<Endpoint>`; every method takes `&self`.
pub struct Endpoint {
    pub(crate) config: EndpointConfig,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) transactions: TransactionTable,
    pub(crate) timers: TimerHeap<TimerEvent>,
    pub(crate) dialogs: DashMap<DialogId, SharedDialog>,
    pub(crate) dialog_index: DashMap<DialogKey, DialogId>,
    transaction_observers: RwLock<Vec<Arc<dyn TransactionObserver>>>,
    dialog_observers: RwLock<Vec<Arc<dyn DialogObserver>>>,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("local_addr", &self.transport.local_addr())
            .field("transactions", &self.transactions.len())
            .field("timers", &self.timers.len())
            .field("dialogs", &self.dialogs.len())
            .finish()
    }
}

impl Endpoint {
    pub fn new(config: EndpointConfig, transport: Arc<dyn Transport>) -> Self {
        Self::with_clock(config, transport, Arc::new(SystemClock))
    }

    /// Endpoint whose timers read time from `clock`
    pub fn with_clock(config: EndpointConfig, transport: Arc<dyn Transport>, clock: Arc<dyn Clock>) -> Self {
        let mut timers = TimerHeap::with_clock(clock);
        if let Some(limit) = config.max_timers {
            timers = timers.with_capacity_limit(limit);
        }
        info!(
            local_addr = %transport.local_addr(),
            protocol = %transport.protocol(),
            t1_ms = config.timers.t1.as_millis() as u64,
            "endpoint created"
        );
        Endpoint {
            transactions: TransactionTable::with_limit(config.max_transactions),
            config,
            transport,
            timers,
            dialogs: DashMap::new(),
            dialog_index: DashMap::new(),
            transaction_observers: RwLock::new(Vec::new()),
            dialog_observers: RwLock::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn add_transaction_observer(&self, observer: Arc<dyn TransactionObserver>) {
        self.transaction_observers.write().push(observer);
    }

    pub fn add_dialog_observer(&self, observer: Arc<dyn DialogObserver>) {
        self.dialog_observers.write().push(observer);
    }

    /// Via for a locally originated request, with a fresh branch
    pub fn new_via(&self) -> Via {
        let addr = self.transport.local_addr();
        Via::new(
            self.transport.protocol().via_token(),
            addr.ip().to_string(),
            Some(addr.port()),
            Some(generate_branch()),
        )
    }

    /// Run `event` through a locked transaction and apply the resulting
    /// actions. Transmit failures are fed back as transport errors. When the
    /// transaction ends, its timers are cancelled and it leaves the table
    /// before the lock is released.
    pub(crate) fn run_event(&self, tsx: &mut Transaction, event: TransactionEvent, out: &mut Outcome) {
        out.dialog = tsx.dialog();
        let mut queue = VecDeque::from([event]);

        while let Some(event) = queue.pop_front() {
            let cause = cause_of(&event);
            let sent = match &event {
                TransactionEvent::Send(SipMessage::Response(response)) => Some(response.clone()),
                _ => None,
            };
            let actions = match tsx.process_event(event) {
                Ok(actions) => actions,
                Err(error) => {
                    debug!(key = %tsx.key(), error = %error, "transaction rejected event");
                    out.error.get_or_insert(error);
                    break;
                }
            };
            out.sent.extend(sent);

            let delivered = actions.iter().find_map(|action| match action {
                TransactionAction::Deliver(SipMessage::Response(response)) => Some(response.clone()),
                _ => None,
            });
            let mut state_changed = false;

            for action in actions {
                match action {
                    TransactionAction::Transmit(message) => {
                        if let Err(error) = self.transport.send(&message.to_bytes(), tsx.destination()) {
                            warn!(key = %tsx.key(), destination = %tsx.destination(), error = %error, "transmit failed");
                            out.transport_error = Some(error.clone());
                            queue.push_back(TransactionEvent::TransportError(error));
                        }
                    }
                    TransactionAction::StartTimer(timer, delay) => {
                        if let Some(previous) = tsx.timers.remove(&timer) {
                            self.timers.cancel(previous);
                        }
                        let payload = TimerEvent {
                            key: tsx.key().clone(),
                            timer,
                        };
                        match self.timers.schedule(delay, payload) {
                            Ok(id) => {
                                tsx.timers.insert(timer, id);
                            }
                            Err(error) => {
                                warn!(key = %tsx.key(), timer = %timer, error = %error, "cannot schedule timer");
                                out.error.get_or_insert(error);
                                queue.push_back(TransactionEvent::Terminate(StatusCode::SERVER_INTERNAL_ERROR));
                            }
                        }
                    }
                    TransactionAction::CancelTimer(timer) => {
                        if let Some(id) = tsx.timers.remove(&timer) {
                            self.timers.cancel(id);
                        }
                    }
                    TransactionAction::Deliver(message) => {
                        if let SipMessage::Response(response) = message {
                            out.delivered.push(response);
                        }
                    }
                    TransactionAction::StateChanged { from, to } => {
                        state_changed = true;
                        out.changes.push(state_change(tsx, from, to, cause, delivered.clone()));
                    }
                }
            }

            if !state_changed && delivered.is_some() {
                let state = tsx.state();
                out.changes.push(state_change(tsx, state, state, cause, delivered));
            }
        }

        if tsx.is_terminated() && !out.terminated {
            for (_, id) in tsx.timers.drain() {
                self.timers.cancel(id);
            }
            self.transactions.remove(tsx.key());
            out.terminated = true;
        }
    }

    /// Post-lock half of a transaction step: dialog bookkeeping, observer
    /// notification and error reporting
    pub(crate) fn finish(&self, out: Outcome) -> Result<()> {
        if let Some(dialog) = out.dialog {
            for response in &out.sent {
                self.on_dialog_response(dialog, response, false);
            }
            for response in &out.delivered {
                self.on_dialog_response(dialog, response, true);
            }
        }

        self.notify_transaction_changes(&out.changes);

        if out.terminated {
            if let Some(dialog) = out.dialog {
                self.release_transaction(dialog);
            }
        }

        match (out.error, out.transport_error) {
            (Some(error), _) => Err(error),
            (None, Some(error)) => Err(Error::Transport(error)),
            (None, None) => Ok(()),
        }
    }

    pub(crate) fn notify_transaction_changes(&self, changes: &[TransactionStateChange]) {
        if changes.is_empty() {
            return;
        }
        let observers = self.transaction_observers.read().clone();
        for change in changes {
            for observer in &observers {
                observer.on_transaction_state_changed(change);
            }
        }
    }

    pub(crate) fn notify_rx_request(&self, key: &TransactionKey, request: &voxcore_sip_core::Request) {
        let observers = self.transaction_observers.read().clone();
        for observer in &observers {
            observer.on_rx_request(key, request);
        }
    }

    pub(crate) fn notify_dialog_state(&self, dialog: &Dialog) {
        let observers = self.dialog_observers.read().clone();
        for observer in &observers {
            observer.on_dialog_state_changed(dialog);
        }
    }

    pub(crate) fn notify_dialog_request(
        &self,
        dialog: &Dialog,
        key: Option<&TransactionKey>,
        request: &voxcore_sip_core::Request,
    ) {
        let observers = self.dialog_observers.read().clone();
        for observer in &observers {
            observer.on_rx_request_in_dialog(dialog, key, request);
        }
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn transaction_state(&self, key: &TransactionKey) -> Option<TransactionState> {
        self.transactions.find(key).map(|shared| shared.lock().state())
    }

    /// Request that created a live transaction
    pub fn transaction_request(&self, key: &TransactionKey) -> Option<voxcore_sip_core::Request> {
        self.transactions.find(key).map(|shared| shared.lock().request().clone())
    }

    pub fn has_transaction(&self, key: &TransactionKey) -> bool {
        self.transactions.contains(key)
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }
}

fn cause_of(event: &TransactionEvent) -> StateChangeCause {
    match event {
        TransactionEvent::Send(_) => StateChangeCause::Sent,
        TransactionEvent::IncomingMessage(_) => StateChangeCause::Received,
        TransactionEvent::TimerFired(_) => StateChangeCause::Timer,
        TransactionEvent::TransportError(_) => StateChangeCause::TransportError,
        TransactionEvent::Terminate(_) => StateChangeCause::Forced,
    }
}

fn state_change(
    tsx: &Transaction,
    previous: TransactionState,
    current: TransactionState,
    cause: StateChangeCause,
    response: Option<Response>,
) -> TransactionStateChange {
    TransactionStateChange {
        key: tsx.key().clone(),
        role: tsx.role(),
        method: tsx.method().clone(),
        previous,
        current,
        status_code: tsx.status_code(),
        cause,
        reason: if current == TransactionState::Terminated {
            tsx.termination_reason().cloned()
        } else {
            None
        },
        dialog: tsx.dialog(),
        response,
    }
}
