//! In-memory transport and recording observer for tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use voxcore_sip_core::Request;

use crate::dialog::{Dialog, DialogId, DialogState};
use crate::errors::TransportError;
use crate::events::{DialogObserver, TransactionObserver, TransactionStateChange};
use crate::transaction::TransactionKey;
use crate::transport::{Transport, TransportProtocol};

/// Transport that keeps everything it is asked to send
#[derive(Debug)]
pub struct MockTransport {
    local_addr: SocketAddr,
    protocol: TransportProtocol,
    failing: AtomicBool,
    sent: Mutex<Vec<(Bytes, SocketAddr)>>,
}

impl MockTransport {
    pub fn new(local_addr: SocketAddr, protocol: TransportProtocol) -> Self {
        MockTransport {
            local_addr,
            protocol,
            failing: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn udp() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 5060)), TransportProtocol::Udp)
    }

    pub fn tcp() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 5060)), TransportProtocol::Tcp)
    }

    /// Make every following `send` fail with `SendFailed`
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(Bytes, SocketAddr)> {
        self.sent.lock().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    /// Start lines of the sent messages, e.g. `INVITE sip:bob@192.0.2.4 SIP/2.0`
    pub fn start_lines(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .map(|(data, _)| {
                String::from_utf8_lossy(data)
                    .lines()
                    .next()
                    .unwrap_or_default()
                    .to_string()
            })
            .collect()
    }

    /// How many sent messages start with `prefix`
    pub fn count_starting_with(&self, prefix: &str) -> usize {
        self.start_lines().iter().filter(|line| line.starts_with(prefix)).count()
    }

    /// Full text of the last sent message
    pub fn last_text(&self) -> Option<String> {
        self.sent
            .lock()
            .last()
            .map(|(data, _)| String::from_utf8_lossy(data).into_owned())
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

impl Transport for MockTransport {
    fn send(&self, data: &[u8], destination: SocketAddr) -> Result<(), TransportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed(format!("mock send to {} failed", destination)));
        }
        self.sent.lock().push((Bytes::copy_from_slice(data), destination));
        Ok(())
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn protocol(&self) -> TransportProtocol {
        self.protocol
    }
}

/// Observer that stores every notification it gets
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub changes: Mutex<Vec<TransactionStateChange>>,
    pub requests: Mutex<Vec<(TransactionKey, Request)>>,
    pub dialog_states: Mutex<Vec<(DialogId, DialogState)>>,
    pub dialog_requests: Mutex<Vec<(DialogId, Option<TransactionKey>, Request)>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn changes(&self) -> Vec<TransactionStateChange> {
        self.changes.lock().clone()
    }

    /// Changes recorded for one transaction
    pub fn changes_for(&self, key: &TransactionKey) -> Vec<TransactionStateChange> {
        self.changes
            .lock()
            .iter()
            .filter(|change| &change.key == key)
            .cloned()
            .collect()
    }

    pub fn requests(&self) -> Vec<(TransactionKey, Request)> {
        self.requests.lock().clone()
    }

    pub fn dialog_states(&self) -> Vec<(DialogId, DialogState)> {
        self.dialog_states.lock().clone()
    }

    pub fn dialog_requests(&self) -> Vec<(DialogId, Option<TransactionKey>, Request)> {
        self.dialog_requests.lock().clone()
    }
}

impl TransactionObserver for RecordingObserver {
    fn on_transaction_state_changed(&self, change: &TransactionStateChange) {
        self.changes.lock().push(change.clone());
    }

    fn on_rx_request(&self, key: &TransactionKey, request: &Request) {
        self.requests.lock().push((key.clone(), request.clone()));
    }
}

impl DialogObserver for RecordingObserver {
    fn on_dialog_state_changed(&self, dialog: &Dialog) {
        self.dialog_states.lock().push((dialog.id(), dialog.state()));
    }

    fn on_rx_request_in_dialog(&self, dialog: &Dialog, transaction: Option<&TransactionKey>, request: &Request) {
        self.dialog_requests
            .lock()
            .push((dialog.id(), transaction.cloned(), request.clone()));
    }
}
