//! Dialog-level operations of the [`Endpoint`]: the dialog registry, requests
//! and responses within a dialog, session counting, forking and the ACK for
//! 2xx responses.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use tracing::{debug, warn};
use voxcore_sip_core::{Method, Request, Response, StatusCode, Uri};

use super::core::{Endpoint, Outcome, SharedDialog};
use crate::dialog::{Dialog, DialogId, DialogKey};
use crate::errors::{Error, Result};
use crate::transaction::{TransactionEvent, TransactionKey, TransactionRole};

impl Endpoint {
    /// Create a dialog for a request this endpoint is about to send.
    ///
    /// A dialog nobody holds a session on is destroyed as soon as its last
    /// transaction ends, so callers that keep it call
    /// [`inc_session`](Self::inc_session) first.
    pub fn create_uac_dialog(
        &self,
        local_uri: Uri,
        remote_uri: Uri,
        target: Uri,
        local_contact: Option<Uri>,
    ) -> Result<DialogId> {
        let dialog = Dialog::new_uac(local_uri, remote_uri, target, local_contact);
        Ok(self.register_dialog(dialog))
    }

    /// Create a dialog for a received dialog-creating request and link it to
    /// the request's server transaction
    pub fn create_uas_dialog(&self, request: &Request, local_contact: Option<Uri>) -> Result<DialogId> {
        let dialog = Dialog::new_uas(request, local_contact)?;
        let key = TransactionKey::for_request(request, TransactionRole::Uas)?;
        let id = self.register_dialog(dialog);

        if let Some(mut tsx) = self.transactions.lock(&key) {
            if tsx.dialog().is_none() {
                tsx.set_dialog(Some(id));
                self.link_transaction(id);
                if request.method == Method::Invite {
                    self.track_invite(id, key.clone());
                }
            }
        }
        Ok(id)
    }

    /// Replace the route set of a UAC dialog that is not yet established,
    /// for example to preload an outbound proxy
    pub fn set_route_set(&self, id: DialogId, routes: Vec<Uri>) -> Result<()> {
        let shared = self.dialog_handle(id)?;
        let mut dialog = shared.lock();
        dialog.set_route_set(routes)?;
        debug!(dialog = %id, routes = dialog.route_set().len(), "route set replaced");
        Ok(())
    }

    fn register_dialog(&self, dialog: Dialog) -> DialogId {
        let id = dialog.id();
        self.dialog_index.insert(dialog.key(), id);
        self.dialogs.insert(id, Arc::new(Mutex::new(dialog)));
        id
    }

    fn dialog_handle(&self, id: DialogId) -> Result<SharedDialog> {
        self.dialogs
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(Error::DialogNotFound(id))
    }

    /// Snapshot of a dialog
    pub fn dialog(&self, id: DialogId) -> Option<Dialog> {
        self.dialogs.get(&id).map(|entry| entry.value().lock().clone())
    }

    pub fn find_dialog(&self, key: &DialogKey) -> Option<DialogId> {
        self.dialog_index.get(key).map(|entry| *entry.value())
    }

    pub fn dialog_count(&self) -> usize {
        self.dialogs.len()
    }

    /// Dialog a response to one of our requests belongs to: exact tags
    /// first, then the early dialog still waiting for a remote tag
    pub(crate) fn dialog_for_response(&self, response: &Response) -> Option<DialogId> {
        let call_id = response.headers.call_id().ok()?;
        let local_tag = response.headers.from_tag()?;
        let key = DialogKey::new(call_id, local_tag, response.headers.to_tag().map(str::to_string));
        self.find_dialog(&key)
            .or_else(|| self.find_dialog(&key.without_remote_tag()))
    }

    /// Send a request within the dialog through a new client transaction.
    ///
    /// The request goes to the first route, or to the remote target when
    /// the route set is empty. ACK is sent with [`send_ack`](Self::send_ack).
    pub fn send_dialog_request(&self, id: DialogId, method: Method, body: Option<Bytes>) -> Result<TransactionKey> {
        if method == Method::Ack {
            return Err(Error::bad_argument("ACK has no transaction; use send_ack"));
        }
        let shared = self.dialog_handle(id)?;
        let (request, destination) = {
            let mut dialog = shared.lock();
            if dialog.is_terminated() {
                return Err(Error::invalid_state(format!("dialog {} is terminated", id)));
            }
            let mut request = dialog.create_request(method, self.new_via());
            if let Some(body) = body {
                request.body = body;
            }
            let destination = dialog.next_hop().socket_addr()?;
            (request, destination)
        };
        self.start_client(request, destination, Some(id))
    }

    /// Send the ACK for a 2xx response to INVITE
    pub fn send_ack(&self, id: DialogId, response: &Response) -> Result<()> {
        let shared = self.dialog_handle(id)?;
        let (ack, destination) = {
            let mut dialog = shared.lock();
            let ack = dialog.create_ack(response, self.new_via())?;
            (ack, dialog.next_hop().socket_addr()?)
        };
        self.send_stateless(&ack.into(), destination)
    }

    /// Response to `request` carrying the dialog's local tag and contact
    pub fn create_response(&self, id: DialogId, request: &Request, status: StatusCode) -> Result<Response> {
        let shared = self.dialog_handle(id)?;
        let response = shared.lock().create_response(request, status);
        Ok(response)
    }

    /// Answer the request of server transaction `key` within the dialog
    pub fn respond(&self, id: DialogId, key: &TransactionKey, status: StatusCode) -> Result<()> {
        let request = {
            let tsx = self
                .transactions
                .lock(key)
                .ok_or_else(|| Error::TransactionNotFound(key.to_string()))?;
            tsx.request().clone()
        };
        let response = self.create_response(id, &request, status)?;
        self.send_response(key, response)
    }

    pub fn inc_session(&self, id: DialogId) -> Result<()> {
        let shared = self.dialog_handle(id)?;
        shared.lock().session_count += 1;
        Ok(())
    }

    /// Release a session hold; the dialog is destroyed right away once no
    /// session and no transaction refers to it
    pub fn dec_session(&self, id: DialogId) -> Result<()> {
        let shared = self.dialog_handle(id)?;
        let unreferenced = {
            let mut dialog = shared.lock();
            if dialog.session_count == 0 {
                return Err(Error::invalid_state(format!("dialog {} has no session to release", id)));
            }
            dialog.session_count -= 1;
            dialog.is_unreferenced()
        };
        if unreferenced {
            self.destroy_dialog(id);
        }
        Ok(())
    }

    pub(crate) fn link_transaction(&self, id: DialogId) {
        if let Some(shared) = self.dialogs.get(&id).map(|entry| entry.value().clone()) {
            shared.lock().transaction_count += 1;
        }
    }

    /// Remember the server INVITE transaction whose 2xx the next ACK
    /// acknowledges
    fn track_invite(&self, id: DialogId, key: TransactionKey) {
        if let Some(shared) = self.dialogs.get(&id).map(|entry| entry.value().clone()) {
            shared.lock().invite_tsx = Some(key);
        }
    }

    /// A linked transaction ended
    pub(crate) fn release_transaction(&self, id: DialogId) {
        let Some(shared) = self.dialogs.get(&id).map(|entry| entry.value().clone()) else {
            return;
        };
        let unreferenced = {
            let mut dialog = shared.lock();
            dialog.transaction_count = dialog.transaction_count.saturating_sub(1);
            dialog.is_unreferenced()
        };
        if unreferenced {
            self.destroy_dialog(id);
        }
    }

    fn destroy_dialog(&self, id: DialogId) {
        let Some((_, shared)) = self.dialogs.remove(&id) else {
            return;
        };
        let (snapshot, changed) = {
            let mut dialog = shared.lock();
            let changed = dialog.terminate();
            (dialog.clone(), changed)
        };
        let key = snapshot.key();
        self.dialog_index.remove_if(&key, |_, owner| *owner == id);
        self.dialog_index.remove_if(&key.without_remote_tag(), |_, owner| *owner == id);
        debug!(dialog = %id, call_id = %snapshot.call_id(), "dialog destroyed");
        if changed {
            self.notify_dialog_state(&snapshot);
        }
    }

    /// Apply a response sent or received by one of the dialog's
    /// transactions, forking and ACKing as needed
    pub(crate) fn on_dialog_response(&self, id: DialogId, response: &Response, received: bool) {
        let Ok(mut shared) = self.dialog_handle(id) else {
            return;
        };
        let mut id = id;

        if received && shared.lock().is_forked_by(response) {
            match self.fork_dialog(&shared, response) {
                Some((fork_id, fork)) => {
                    id = fork_id;
                    shared = fork;
                }
                None => return,
            }
        }

        let (changed, snapshot, ack) = {
            let mut dialog = shared.lock();
            let old_key = dialog.key();
            let changed = match dialog.on_response(response, received) {
                Ok(changed) => changed,
                Err(error) => {
                    debug!(dialog = %id, error = %error, "response ignored by dialog");
                    return;
                }
            };
            let key = dialog.key();
            if key != old_key {
                self.dialog_index.insert(key, id);
            }

            let needs_ack = received
                && self.config.auto_ack_2xx
                && response.is_success()
                && matches!(response.cseq_method(), Ok(Method::Invite));
            let ack = if needs_ack { self.ack_for(&mut dialog, response) } else { None };
            (changed, dialog.clone(), ack)
        };

        if let Some((ack, destination)) = ack {
            if let Err(error) = self.send_stateless(&ack.into(), destination) {
                warn!(dialog = %id, error = %error, "cannot send ACK");
            }
        }
        if changed {
            self.notify_dialog_state(&snapshot);
        }
        if snapshot.is_terminated() && snapshot.is_unreferenced() {
            self.destroy_dialog(id);
        }
    }

    /// The stored ACK for a retransmitted 2xx, or a new one
    fn ack_for(&self, dialog: &mut Dialog, response: &Response) -> Option<(Request, SocketAddr)> {
        let seq = response.headers.cseq().ok()?.seq;
        let ack = match dialog.stored_ack(seq) {
            Some(ack) => ack.clone(),
            None => dialog.create_ack(response, self.new_via()).ok()?,
        };
        let destination = dialog.next_hop().socket_addr().ok()?;
        Some((ack, destination))
    }

    /// Dialog for a forked response, created on first sight
    fn fork_dialog(&self, parent: &SharedDialog, response: &Response) -> Option<(DialogId, SharedDialog)> {
        let remote_tag = response.headers.to_tag()?;
        let forked = parent.lock().fork();
        let key = DialogKey::new(forked.call_id(), forked.local_tag(), Some(remote_tag.to_string()));

        match self.dialog_index.entry(key) {
            Entry::Occupied(entry) => {
                let existing = *entry.get();
                drop(entry);
                self.dialog_handle(existing).ok().map(|shared| (existing, shared))
            }
            Entry::Vacant(entry) => {
                let id = forked.id();
                entry.insert(id);
                debug!(dialog = %id, remote_tag, "forked dialog created");
                let shared = Arc::new(Mutex::new(forked));
                self.dialogs.insert(id, shared.clone());
                Some((id, shared))
            }
        }
    }

    /// Request with a To tag matching a known dialog
    pub(crate) fn on_rx_request_in_dialog(&self, id: DialogId, request: Request, source: SocketAddr) -> Result<()> {
        let shared = self.dialog_handle(id)?;
        let checked = shared.lock().check_rx_request(&request);
        if let Err(error) = checked {
            warn!(dialog = %id, method = %request.method, error = %error, "in-dialog request rejected");
            if matches!(error, Error::CSeqTooOld { .. }) {
                if let Err(send_error) = self.respond_stateless(&request, StatusCode::SERVER_INTERNAL_ERROR, source) {
                    debug!(dialog = %id, error = %send_error, "cannot send 500");
                }
            }
            return Err(error);
        }

        let tsx = self.transactions.create_uas(
            request.clone(),
            source,
            self.transport.is_reliable(),
            self.config.timers,
        )?;
        let key = {
            let mut tsx = tsx.lock();
            tsx.set_dialog(Some(id));
            self.link_transaction(id);
            tsx.key().clone()
        };
        if request.method == Method::Invite {
            self.track_invite(id, key.clone());
        }
        debug!(dialog = %id, key = %key, method = %request.method, "in-dialog request accepted");

        // Only a request that got a transaction moves the remote CSeq, so a
        // retransmission of a refused one is still accepted
        let snapshot = {
            let mut dialog = shared.lock();
            dialog.accept_rx_request(&request)?;
            dialog.clone()
        };
        self.notify_dialog_request(&snapshot, Some(&key), &request);
        Ok(())
    }

    /// ACK for a 2xx: it carries its own branch, so the dialog hands it to
    /// the server INVITE transaction still resending the 2xx and then to the
    /// observers
    pub(crate) fn on_ack_2xx(&self, ack: Request) -> Result<()> {
        let key = DialogKey::new(
            ack.headers.call_id()?,
            ack.headers.to_tag().unwrap_or_default(),
            ack.headers.from_tag().map(str::to_string),
        );
        let Some(id) = self.find_dialog(&key) else {
            debug!(dialog = %key, "ACK without dialog dropped");
            return Ok(());
        };
        let seq = ack.cseq_number()?;
        let (snapshot, invite) = {
            let shared = self.dialog_handle(id)?;
            let dialog = shared.lock();
            (dialog.clone(), dialog.invite_tsx.clone())
        };
        // Observers first: the transaction ending may release the dialog
        self.notify_dialog_request(&snapshot, None, &ack);

        let Some(mut tsx) = invite.and_then(|key| self.transactions.lock(&key)) else {
            return Ok(());
        };
        if tsx.request().cseq_number().ok() != Some(seq) {
            debug!(dialog = %id, cseq = seq, "ACK does not match the pending INVITE");
            return Ok(());
        }
        let mut out = Outcome::default();
        self.run_event(&mut tsx, TransactionEvent::IncomingMessage(ack.into()), &mut out);
        drop(tsx);
        self.finish(out)
    }
}
