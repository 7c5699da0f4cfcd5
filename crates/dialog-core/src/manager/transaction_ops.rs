//! Transaction-level operations of the [`Endpoint`]: sending requests and
//! responses, CANCEL, the receive path and timer dispatch.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};
use voxcore_sip_core::{
    generate_tag, CSeq, Method, Request, Response, SipMessage, StatusCode,
};

use super::core::{Endpoint, Outcome, TimerEvent};
use crate::dialog::{DialogId, DialogKey};
use crate::errors::{Error, Result};
use crate::transaction::{
    Transaction, TransactionEvent, TransactionKey, TransactionRole, TransactionState,
};

impl Endpoint {
    /// Send `request` through a new client transaction.
    ///
    /// Returns the transaction key; the outcome is reported to the
    /// transaction observers. A transport failure on the first send ends the
    /// transaction and is also returned here.
    pub fn send_request(&self, request: Request, destination: SocketAddr) -> Result<TransactionKey> {
        self.start_client(request, destination, None)
    }

    pub(crate) fn start_client(
        &self,
        request: Request,
        destination: SocketAddr,
        dialog: Option<DialogId>,
    ) -> Result<TransactionKey> {
        let mut tsx = Transaction::new_uac(
            request.clone(),
            destination,
            self.transport.is_reliable(),
            self.config.timers,
        )?
        .with_proxy_mode(self.config.proxy_mode);
        tsx.set_dialog(dialog);
        let key = tsx.key().clone();
        let shared = self.transactions.insert(tsx)?;
        if let Some(dialog) = dialog {
            self.link_transaction(dialog);
        }

        debug!(key = %key, destination = %destination, method = %request.method, "sending request");
        let mut out = Outcome::default();
        {
            let mut tsx = shared.lock();
            self.run_event(&mut tsx, TransactionEvent::Send(request.into()), &mut out);
        }
        self.finish(out)?;
        Ok(key)
    }

    /// Send a TU response through the server transaction `key`
    pub fn send_response(&self, key: &TransactionKey, response: Response) -> Result<()> {
        let mut out = Outcome::default();
        {
            let mut tsx = self
                .transactions
                .lock(key)
                .ok_or_else(|| Error::TransactionNotFound(key.to_string()))?;
            self.run_event(&mut tsx, TransactionEvent::Send(response.into()), &mut out);
        }
        self.finish(out)
    }

    /// Force a transaction to Terminated, reporting `status` to observers
    pub fn terminate_transaction(&self, key: &TransactionKey, status: StatusCode) -> Result<()> {
        let mut out = Outcome::default();
        {
            let mut tsx = self
                .transactions
                .lock(key)
                .ok_or_else(|| Error::TransactionNotFound(key.to_string()))?;
            self.run_event(&mut tsx, TransactionEvent::Terminate(status), &mut out);
        }
        self.finish(out)
    }

    /// Cancel a pending INVITE client transaction by sending a CANCEL
    /// (RFC 3261 section 9.1). Returns the CANCEL's own transaction key.
    pub fn cancel(&self, invite_key: &TransactionKey) -> Result<TransactionKey> {
        let (cancel, destination, dialog) = {
            let tsx = self
                .transactions
                .lock(invite_key)
                .ok_or_else(|| Error::TransactionNotFound(invite_key.to_string()))?;
            if tsx.role() != TransactionRole::Uac || *tsx.method() != Method::Invite {
                return Err(Error::bad_argument(format!("{} is not an INVITE client transaction", invite_key)));
            }
            if !matches!(tsx.state(), TransactionState::Calling | TransactionState::Proceeding) {
                return Err(Error::invalid_state(format!(
                    "cannot cancel {} in state {}",
                    invite_key,
                    tsx.state()
                )));
            }
            (build_cancel(tsx.request()), tsx.destination(), tsx.dialog())
        };
        self.start_client(cancel, destination, dialog)
    }

    /// Send a message without a transaction (ACK for 2xx, stateless replies)
    pub fn send_stateless(&self, message: &SipMessage, destination: SocketAddr) -> Result<()> {
        trace!(message = %message.summary(), destination = %destination, "sending stateless");
        self.transport.send(&message.to_bytes(), destination)?;
        Ok(())
    }

    /// Answer `request` outside any transaction
    pub(crate) fn respond_stateless(&self, request: &Request, status: StatusCode, source: SocketAddr) -> Result<()> {
        let mut response = Response::from_request(request, status);
        if response.headers.to_tag().is_none() {
            response = response.with_to_tag(generate_tag());
        }
        debug!(status = %status, request = %request.method, destination = %source, "stateless response");
        self.send_stateless(&response.into(), source)
    }

    /// Entry point for every parsed message the transport receives.
    ///
    /// Fails with `BadArgument` when the message lacks the headers needed to
    /// match it, and with `CSeqTooOld` when an in-dialog request is out of
    /// order (after answering it with 500).
    pub fn on_receive(&self, message: SipMessage, source: SocketAddr) -> Result<()> {
        trace!(message = %message.summary(), source = %source, "message received");

        if let Some(mut tsx) = self.transactions.find_and_lock(&message)? {
            let mut out = Outcome::default();
            self.run_event(&mut tsx, TransactionEvent::IncomingMessage(message), &mut out);
            drop(tsx);
            return self.finish(out);
        }

        match message {
            SipMessage::Response(response) => self.on_stray_response(response),
            SipMessage::Request(request) => self.on_new_request(request, source),
        }
    }

    fn on_stray_response(&self, response: Response) -> Result<()> {
        let is_invite_2xx = response.is_success() && response.cseq_method()? == &Method::Invite;
        if !is_invite_2xx {
            debug!(response = %response.status, "stray response dropped");
            return Ok(());
        }
        // Retransmitted or forked 2xx after the INVITE transaction ended
        match self.dialog_for_response(&response) {
            Some(dialog) => {
                self.on_dialog_response(dialog, &response, true);
                Ok(())
            }
            None => {
                debug!(response = %response.status, "2xx without a dialog dropped");
                Ok(())
            }
        }
    }

    fn on_new_request(&self, request: Request, source: SocketAddr) -> Result<()> {
        match request.method {
            Method::Ack => return self.on_ack_2xx(request),
            Method::Cancel => return self.on_cancel(request, source),
            _ => {}
        }

        if request.headers.to_tag().is_some() {
            let key = DialogKey::new(
                request.headers.call_id()?,
                request.headers.to_tag().unwrap_or_default(),
                request.headers.from_tag().map(str::to_string),
            );
            return match self.find_dialog(&key) {
                Some(dialog) => self.on_rx_request_in_dialog(dialog, request, source),
                None => {
                    debug!(dialog = %key, method = %request.method, "request for unknown dialog");
                    self.respond_stateless(&request, StatusCode::CALL_DOES_NOT_EXIST, source)
                }
            };
        }

        let shared = self.transactions.create_uas(
            request.clone(),
            source,
            self.transport.is_reliable(),
            self.config.timers,
        )?;
        let key = shared.lock().key().clone();
        debug!(key = %key, method = %request.method, source = %source, "server transaction created");

        if request.method == Method::Invite && self.config.auto_100_trying {
            let trying = Response::from_request(&request, StatusCode::TRYING);
            let mut out = Outcome::default();
            {
                let mut tsx = shared.lock();
                self.run_event(&mut tsx, TransactionEvent::Send(trying.into()), &mut out);
            }
            if let Err(error) = self.finish(out) {
                warn!(key = %key, error = %error, "cannot send 100 Trying");
            }
        }

        self.notify_rx_request(&key, &request);
        Ok(())
    }

    /// CANCEL matching no transaction of its own: answer it and end the
    /// INVITE it refers to with 487
    fn on_cancel(&self, cancel: Request, source: SocketAddr) -> Result<()> {
        let invite_key = TransactionKey::invite_for_cancel(&cancel)?;
        let cancel_tsx = self.transactions.create_uas(
            cancel.clone(),
            source,
            self.transport.is_reliable(),
            self.config.timers,
        )?;
        let cancel_key = cancel_tsx.lock().key().clone();

        let mut to_tag = None;
        let status = match self.transactions.lock(&invite_key) {
            Some(mut invite) => {
                if invite.state() == TransactionState::Proceeding {
                    let tag = invite
                        .last_response()
                        .and_then(|r| r.headers.to_tag().map(str::to_string))
                        .unwrap_or_else(generate_tag);
                    let terminated = Response::from_request(invite.request(), StatusCode::REQUEST_TERMINATED)
                        .with_to_tag(tag.clone());
                    to_tag = Some(tag);
                    let mut out = Outcome::default();
                    self.run_event(&mut invite, TransactionEvent::Send(terminated.into()), &mut out);
                    drop(invite);
                    if let Err(error) = self.finish(out) {
                        warn!(key = %invite_key, error = %error, "cannot send 487");
                    }
                }
                StatusCode::OK
            }
            None => StatusCode::CALL_DOES_NOT_EXIST,
        };
        debug!(key = %cancel_key, invite = %invite_key, status = %status, "answering CANCEL");

        let mut response = Response::from_request(&cancel, status);
        if response.headers.to_tag().is_none() {
            response = response.with_to_tag(to_tag.unwrap_or_else(generate_tag));
        }
        let mut out = Outcome::default();
        {
            let mut tsx = cancel_tsx.lock();
            self.run_event(&mut tsx, TransactionEvent::Send(response.into()), &mut out);
        }
        self.finish(out)?;
        self.notify_rx_request(&cancel_key, &cancel);
        Ok(())
    }

    /// Fire due transaction timers, at most `max_count`. Returns how many
    /// fired, stale ones included.
    pub fn poll_timers(&self, max_count: usize) -> usize {
        self.timers.poll(max_count, |id, TimerEvent { key, timer }| {
            let Some(shared) = self.transactions.find(&key) else {
                trace!(key = %key, timer = %timer, "timer for a finished transaction");
                return;
            };
            let mut out = Outcome::default();
            {
                let mut tsx = shared.lock();
                if tsx.timers.get(&timer) != Some(&id) {
                    trace!(key = %key, timer = %timer, "stale timer ignored");
                    return;
                }
                tsx.timers.remove(&timer);
                self.run_event(&mut tsx, TransactionEvent::TimerFired(timer), &mut out);
            }
            if let Err(error) = self.finish(out) {
                debug!(key = %key, timer = %timer, error = %error, "timer handling reported an error");
            }
        })
    }

    pub fn next_timer_expiry(&self) -> Option<Instant> {
        self.timers.next_expiry()
    }

    /// Time until the earliest pending timer; zero if one is already due
    pub fn time_until_next_timer(&self) -> Option<Duration> {
        self.timers.time_until_next()
    }

    /// Drop terminated transactions left in the table
    pub fn collect_garbage(&self) -> usize {
        self.transactions.collect_garbage()
    }
}

/// CANCEL for `invite` per RFC 3261 section 9.1: same Request-URI, Call-ID,
/// From, To, CSeq number, top Via and Route
fn build_cancel(invite: &Request) -> Request {
    let mut cancel = Request::new(Method::Cancel, invite.uri.clone());
    cancel.headers.via = invite.headers.via.iter().take(1).cloned().collect();
    cancel.headers.from = invite.headers.from.clone();
    cancel.headers.to = invite.headers.to.clone();
    cancel.headers.call_id = invite.headers.call_id.clone();
    cancel.headers.cseq = invite
        .headers
        .cseq
        .as_ref()
        .map(|cseq| CSeq::new(cseq.seq, Method::Cancel));
    cancel.headers.route = invite.headers.route.clone();
    cancel.headers.max_forwards = Some(70);
    cancel
}

#[cfg(test)]
mod tests {
    use voxcore_sip_core::prelude::*;

    use super::*;

    #[test]
    fn test_cancel_mirrors_invite() {
        let invite = RequestBuilder::new(Method::Invite, "sip:bob@192.0.2.4".parse().unwrap())
            .via(Via::udp("192.0.2.1", Some(5060), "z9hG4bKc1"))
            .via(Via::udp("192.0.2.9", Some(5060), "z9hG4bKc0"))
            .from(NameAddr::new("sip:alice@192.0.2.1".parse().unwrap()).with_tag("a"))
            .to(NameAddr::new("sip:bob@192.0.2.4".parse().unwrap()))
            .call_id("call-cancel")
            .cseq(3)
            .route("sip:192.0.2.7;lr".parse().unwrap())
            .build();
        let cancel = build_cancel(&invite);
        assert_eq!(cancel.uri, invite.uri);
        assert_eq!(cancel.headers.via.len(), 1);
        assert_eq!(cancel.branch(), Some("z9hG4bKc1"));
        assert_eq!(cancel.headers.cseq, Some(CSeq::new(3, Method::Cancel)));
        assert_eq!(cancel.headers.route, invite.headers.route);
        assert_eq!(
            TransactionKey::invite_for_cancel(&cancel).unwrap(),
            TransactionKey::for_request(&invite, TransactionRole::Uas).unwrap()
        );
    }
}
