//! Dialog implementation for RFC 3261 SIP dialogs
//!
//! The [`Dialog`] struct holds the state of section 12 (Call-ID, tags,
//! sequence numbers, route set, remote target) and knows how to build
//! in-dialog requests and responses. It does no I/O; the
//! [`Endpoint`](crate::manager::Endpoint) owns dialogs in its registry and
//! wires them to transactions.

use rand::Rng;
use tracing::debug;
use voxcore_sip_core::{
    generate_call_id, generate_tag, Method, NameAddr, Request, RequestBuilder, Response, StatusCode,
    Uri, Via,
};

use super::dialog_id::{DialogId, DialogKey};
use super::dialog_state::DialogState;
use crate::errors::{Error, Result};
use crate::transaction::TransactionKey;

/// Largest initial local CSeq; RFC 3261 requires it to stay below 2**31
const MAX_INITIAL_CSEQ: u32 = 0x7FFF_FFFF;

/// A SIP dialog as defined in RFC 3261
#[derive(Debug, Clone)]
pub struct Dialog {
    id: DialogId,
    state: DialogState,

    /// Whether the local UA sent the dialog-creating request
    is_initiator: bool,

    call_id: String,
    local_uri: Uri,
    remote_uri: Uri,
    local_tag: String,
    remote_tag: Option<String>,

    local_cseq: u32,
    /// Unset until the remote party sends its first in-dialog request
    remote_cseq: Option<u32>,

    local_contact: Option<Uri>,
    remote_target: Uri,

    /// Routes in the order they are placed in outgoing Route headers
    route_set: Vec<Uri>,
    secure: bool,

    /// CSeq of the dialog-creating request
    initial_cseq: Option<u32>,
    /// CSeq of the last INVITE sent, reused by its ACK
    invite_cseq: Option<u32>,
    /// ACK sent for the last 2xx, re-sent when the 2xx is retransmitted
    ack: Option<Request>,
    /// Server INVITE transaction waiting for the ACK of its 2xx
    pub(crate) invite_tsx: Option<TransactionKey>,

    pub(crate) session_count: u32,
    pub(crate) transaction_count: u32,
}

impl Dialog {
    /// Dialog for a request we are about to send.
    ///
    /// A fresh Call-ID and local tag are generated, the local CSeq starts at
    /// a random value and the remote CSeq is unset.
    pub fn new_uac(local_uri: Uri, remote_uri: Uri, target: Uri, local_contact: Option<Uri>) -> Self {
        let secure = target.is_secure();
        let dialog = Dialog {
            id: DialogId::new(),
            state: DialogState::Null,
            is_initiator: true,
            call_id: generate_call_id(),
            local_uri,
            remote_uri,
            local_tag: generate_tag(),
            remote_tag: None,
            local_cseq: initial_cseq(),
            remote_cseq: None,
            local_contact,
            remote_target: target,
            route_set: Vec::new(),
            secure,
            initial_cseq: None,
            invite_cseq: None,
            ack: None,
            invite_tsx: None,
            session_count: 0,
            transaction_count: 0,
        };
        debug!(dialog = %dialog.id, call_id = %dialog.call_id, "UAC dialog created");
        dialog
    }

    /// Dialog for a received dialog-creating request.
    ///
    /// The local tag is the request's To tag if it has one. The route set is
    /// the request's Record-Route list reversed.
    pub fn new_uas(request: &Request, local_contact: Option<Uri>) -> Result<Self> {
        if !request.method.creates_dialog() {
            return Err(Error::bad_argument(format!("{} does not create a dialog", request.method)));
        }
        let headers = &request.headers;
        let call_id = headers.call_id()?.to_string();
        let from = headers.from()?;
        let to = headers.to()?;
        let cseq = headers.cseq()?.seq;
        let remote_target = headers
            .contact
            .as_ref()
            .map(|contact| contact.uri.clone())
            .ok_or_else(|| Error::bad_argument("dialog-creating request without Contact"))?;

        let dialog = Dialog {
            id: DialogId::new(),
            state: DialogState::Null,
            is_initiator: false,
            call_id,
            local_uri: to.uri.clone(),
            remote_uri: from.uri.clone(),
            local_tag: to.tag().map(str::to_string).unwrap_or_else(generate_tag),
            remote_tag: from.tag().map(str::to_string),
            local_cseq: initial_cseq(),
            remote_cseq: Some(cseq),
            local_contact,
            remote_target,
            route_set: headers.record_route.iter().rev().cloned().collect(),
            secure: request.uri.is_secure(),
            initial_cseq: Some(cseq),
            invite_cseq: None,
            ack: None,
            invite_tsx: None,
            session_count: 0,
            transaction_count: 0,
        };
        debug!(dialog = %dialog.id, call_id = %dialog.call_id, "UAS dialog created");
        Ok(dialog)
    }

    /// Early dialog for a forked response: same Call-ID and local tag, the
    /// remote side is learned from the response that caused the fork
    pub fn fork(&self) -> Self {
        Dialog {
            id: DialogId::new(),
            state: DialogState::Null,
            remote_tag: None,
            ack: None,
            invite_tsx: None,
            session_count: 0,
            transaction_count: 0,
            ..self.clone()
        }
    }

    pub fn id(&self) -> DialogId {
        self.id
    }

    pub fn state(&self) -> DialogState {
        self.state
    }

    pub fn is_initiator(&self) -> bool {
        self.is_initiator
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn local_uri(&self) -> &Uri {
        &self.local_uri
    }

    pub fn remote_uri(&self) -> &Uri {
        &self.remote_uri
    }

    pub fn local_tag(&self) -> &str {
        &self.local_tag
    }

    pub fn remote_tag(&self) -> Option<&str> {
        self.remote_tag.as_deref()
    }

    pub fn local_cseq(&self) -> u32 {
        self.local_cseq
    }

    pub fn remote_cseq(&self) -> Option<u32> {
        self.remote_cseq
    }

    pub fn local_contact(&self) -> Option<&Uri> {
        self.local_contact.as_ref()
    }

    pub fn remote_target(&self) -> &Uri {
        &self.remote_target
    }

    pub fn route_set(&self) -> &[Uri] {
        &self.route_set
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn session_count(&self) -> u32 {
        self.session_count
    }

    pub fn transaction_count(&self) -> u32 {
        self.transaction_count
    }

    pub fn key(&self) -> DialogKey {
        DialogKey::new(self.call_id.clone(), self.local_tag.clone(), self.remote_tag.clone())
    }

    pub fn is_terminated(&self) -> bool {
        self.state.is_terminated()
    }

    /// No session holds the dialog and no transaction is pending
    pub fn is_unreferenced(&self) -> bool {
        self.session_count == 0 && self.transaction_count == 0
    }

    /// Replace the route set before the dialog is established.
    ///
    /// Only the UAC may preload routes, and only while the dialog is Null or
    /// Early; later the route set is fixed by the 2xx.
    pub fn set_route_set(&mut self, routes: Vec<Uri>) -> Result<()> {
        if !self.is_initiator || !matches!(self.state, DialogState::Null | DialogState::Early) {
            return Err(Error::InvalidState(format!(
                "route set is fixed in {} {} dialog",
                self.state,
                if self.is_initiator { "UAC" } else { "UAS" }
            )));
        }
        self.route_set = routes;
        Ok(())
    }

    pub(crate) fn terminate(&mut self) -> bool {
        let changed = self.state != DialogState::Terminated;
        self.state = DialogState::Terminated;
        changed
    }

    /// First hop for requests in this dialog: the first route, or the
    /// remote target when there is no route set
    pub fn next_hop(&self) -> &Uri {
        self.route_set.first().unwrap_or(&self.remote_target)
    }

    /// Build the next request in the dialog.
    ///
    /// ACK reuses the CSeq of the last INVITE and CANCEL the current one;
    /// every other method takes the next local CSeq.
    pub fn create_request(&mut self, method: Method, via: Via) -> Request {
        let seq = match method {
            Method::Ack => self.invite_cseq.unwrap_or(self.local_cseq),
            Method::Cancel => self.local_cseq,
            _ => {
                self.local_cseq += 1;
                self.local_cseq
            }
        };
        if method == Method::Invite {
            self.invite_cseq = Some(seq);
        }
        if self.initial_cseq.is_none() && method.creates_dialog() {
            self.initial_cseq = Some(seq);
        }
        self.build_request(method, seq, via)
    }

    fn build_request(&self, method: Method, seq: u32, via: Via) -> Request {
        let (uri, routes) = self.request_target();

        let mut to = NameAddr::new(self.remote_uri.clone());
        if let Some(tag) = &self.remote_tag {
            to = to.with_tag(tag.clone());
        }
        let mut builder = RequestBuilder::new(method, uri)
            .via(via)
            .from(NameAddr::new(self.local_uri.clone()).with_tag(self.local_tag.clone()))
            .to(to)
            .call_id(self.call_id.clone())
            .cseq(seq);
        if let Some(contact) = &self.local_contact {
            builder = builder.contact(NameAddr::new(contact.clone()));
        }
        for route in routes {
            builder = builder.route(route);
        }
        builder.build()
    }

    /// Request-URI and Route headers per RFC 3261 section 12.2.1.1
    fn request_target(&self) -> (Uri, Vec<Uri>) {
        match self.route_set.first() {
            Some(first) if !first.is_loose_route() => {
                // Strict router: it becomes the Request-URI and the remote
                // target goes last
                let mut routes = self.route_set[1..].to_vec();
                routes.push(self.remote_target.clone());
                (first.clone(), routes)
            }
            _ => (self.remote_target.clone(), self.route_set.clone()),
        }
    }

    /// Build (and remember) the ACK for a 2xx response to INVITE
    pub fn create_ack(&mut self, response: &Response, via: Via) -> Result<Request> {
        let seq = response.headers.cseq()?.seq;
        let ack = self.build_request(Method::Ack, seq, via);
        self.ack = Some(ack.clone());
        Ok(ack)
    }

    /// The ACK already sent for the 2xx with CSeq `seq`, if any
    pub fn stored_ack(&self, seq: u32) -> Option<&Request> {
        self.ack
            .as_ref()
            .filter(|ack| ack.cseq_number().map_or(false, |n| n == seq))
    }

    /// Response to an in-dialog or dialog-creating request
    pub fn create_response(&self, request: &Request, status: StatusCode) -> Response {
        let mut response = Response::from_request(request, status);
        if status != StatusCode::TRYING && response.headers.to_tag().is_none() {
            if let Some(to) = response.headers.to.as_mut() {
                to.tag = Some(self.local_tag.clone());
            }
        }
        if request.method.creates_dialog() {
            let code = status.as_u16();
            if (101..=299).contains(&code) {
                response.headers.contact = self.local_contact.clone().map(NameAddr::new);
            }
            response.headers.record_route = request.headers.record_route.clone();
        }
        response
    }

    /// Check an incoming in-dialog request.
    ///
    /// Requests whose CSeq does not exceed the last accepted remote CSeq are
    /// rejected with [`Error::CSeqTooOld`]. ACK and CANCEL carry the CSeq of
    /// the request they refer to and are not checked. A target refresh
    /// request updates the remote target.
    pub fn on_rx_request(&mut self, request: &Request) -> Result<()> {
        self.check_rx_request(request)?;
        self.accept_rx_request(request)
    }

    /// CSeq check of [`on_rx_request`](Self::on_rx_request) without
    /// touching the dialog
    pub fn check_rx_request(&self, request: &Request) -> Result<()> {
        if matches!(request.method, Method::Ack | Method::Cancel) {
            return Ok(());
        }
        let seq = request.cseq_number()?;
        match self.remote_cseq {
            Some(last) if seq <= last => Err(Error::CSeqTooOld { received: seq, last }),
            _ => Ok(()),
        }
    }

    /// Record a request that passed [`check_rx_request`](Self::check_rx_request)
    pub fn accept_rx_request(&mut self, request: &Request) -> Result<()> {
        if matches!(request.method, Method::Ack | Method::Cancel) {
            return Ok(());
        }
        let seq = request.cseq_number()?;
        self.remote_cseq = Some(self.remote_cseq.map_or(seq, |last| last.max(seq)));

        if matches!(request.method, Method::Invite | Method::Update | Method::Subscribe) {
            if let Some(contact) = &request.headers.contact {
                self.remote_target = contact.uri.clone();
            }
        }
        Ok(())
    }

    /// Apply a response sent or received within the dialog. Returns whether
    /// the dialog state changed.
    pub fn on_response(&mut self, response: &Response, received: bool) -> Result<bool> {
        let cseq = response.headers.cseq()?;
        let code = response.status.as_u16();
        let before = self.state;

        if self.state.is_terminated() {
            return Ok(false);
        }

        let initial = Some(cseq.seq) == self.initial_cseq && cseq.method.creates_dialog();
        if initial {
            if self.is_initiator && received && (101..=299).contains(&code) {
                self.learn_remote(response);
            }
            let tagged = response.headers.to_tag().is_some();
            match code {
                101..=199 if tagged && self.state == DialogState::Null => {
                    self.state = DialogState::Early;
                }
                200..=299 if self.state != DialogState::Established => {
                    self.state = DialogState::Established;
                }
                300..=699 if self.state != DialogState::Established => {
                    self.state = DialogState::Terminated;
                }
                _ => {}
            }
        } else if cseq.method == Method::Bye && response.status.is_final() {
            self.state = DialogState::Terminated;
        } else if received && cseq.method == Method::Invite && response.status.is_success() {
            if let Some(contact) = &response.headers.contact {
                self.remote_target = contact.uri.clone();
            }
        }

        if self.state != before {
            debug!(dialog = %self.id, from = %before, to = %self.state, "dialog state changed");
        }
        Ok(self.state != before)
    }

    /// Whether `response` comes from a different fork than the one this
    /// dialog is already bound to
    pub fn is_forked_by(&self, response: &Response) -> bool {
        let Some(current) = self.remote_tag.as_deref() else {
            return false;
        };
        let Some(tag) = response.headers.to_tag() else {
            return false;
        };
        let Ok(cseq) = response.headers.cseq() else {
            return false;
        };
        self.is_initiator
            && Some(cseq.seq) == self.initial_cseq
            && cseq.method.creates_dialog()
            && (101..=299).contains(&response.status.as_u16())
            && tag != current
    }

    /// Take the remote tag, route set and target from a response to the
    /// dialog-creating request. A 2xx refreshes them until the dialog is
    /// established.
    fn learn_remote(&mut self, response: &Response) {
        let Some(tag) = response.headers.to_tag() else {
            return;
        };
        let first = self.remote_tag.is_none();
        let refresh = response.status.is_success() && self.state != DialogState::Established;
        if !first && !refresh {
            return;
        }
        self.remote_tag = Some(tag.to_string());
        self.route_set = response.headers.record_route.iter().rev().cloned().collect();
        if let Some(contact) = &response.headers.contact {
            self.remote_target = contact.uri.clone();
        }
    }
}

fn initial_cseq() -> u32 {
    rand::thread_rng().gen_range(1..MAX_INITIAL_CSEQ)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    fn via() -> Via {
        Via::udp("192.0.2.1", Some(5060), "z9hG4bKdlg")
    }

    fn uac() -> Dialog {
        Dialog::new_uac(
            uri("sip:alice@example.com"),
            uri("sip:bob@example.com"),
            uri("sip:bob@192.0.2.4"),
            Some(uri("sip:alice@192.0.2.1")),
        )
    }

    fn incoming_invite() -> Request {
        RequestBuilder::new(Method::Invite, uri("sip:bob@192.0.2.4"))
            .via(Via::udp("192.0.2.1", Some(5060), "z9hG4bKinv"))
            .from(NameAddr::new(uri("sip:alice@example.com")).with_tag("alice-tag"))
            .to(NameAddr::new(uri("sip:bob@example.com")))
            .call_id("call-uas")
            .cseq(5)
            .contact(NameAddr::new(uri("sip:alice@192.0.2.1")))
            .record_route(uri("sip:p1.example.com;lr"))
            .record_route(uri("sip:p2.example.com;lr"))
            .build()
    }

    fn in_dialog(method: Method, seq: u32) -> Request {
        RequestBuilder::new(method, uri("sip:alice@192.0.2.1"))
            .via(Via::udp("192.0.2.4", Some(5060), format!("z9hG4bK{}", seq)))
            .from(NameAddr::new(uri("sip:bob@example.com")).with_tag("bob-tag"))
            .to(NameAddr::new(uri("sip:alice@example.com")).with_tag("x"))
            .call_id("c")
            .cseq(seq)
            .build()
    }

    #[test]
    fn test_uac_dialog_defaults() {
        let dialog = uac();
        assert_eq!(dialog.state(), DialogState::Null);
        assert!(dialog.is_initiator());
        assert!(dialog.remote_cseq().is_none());
        assert!(dialog.local_cseq() >= 1 && dialog.local_cseq() < MAX_INITIAL_CSEQ);
        assert_eq!(dialog.local_tag().len(), 16);
        assert!(!dialog.is_secure());
        assert_ne!(uac().local_tag(), dialog.local_tag());
    }

    #[test]
    fn test_uas_route_set_is_reversed() {
        let dialog = Dialog::new_uas(&incoming_invite(), None).unwrap();
        assert_eq!(
            dialog.route_set(),
            &[uri("sip:p2.example.com;lr"), uri("sip:p1.example.com;lr")]
        );
        assert_eq!(dialog.remote_tag(), Some("alice-tag"));
        assert_eq!(dialog.remote_cseq(), Some(5));
        assert_eq!(dialog.remote_target(), &uri("sip:alice@192.0.2.1"));
    }

    #[test]
    fn test_uas_requires_contact() {
        let mut request = incoming_invite();
        request.headers.contact = None;
        assert!(matches!(Dialog::new_uas(&request, None), Err(Error::BadArgument(_))));
    }

    #[test]
    fn test_cseq_monotonicity() {
        let mut dialog = uac();
        let mut accepted = Vec::new();
        for seq in [5, 7, 6, 8] {
            match dialog.on_rx_request(&in_dialog(Method::Info, seq)) {
                Ok(()) => accepted.push(seq),
                Err(err) => assert_eq!(err, Error::CSeqTooOld { received: 6, last: 7 }),
            }
        }
        assert_eq!(accepted, vec![5, 7, 8]);
        // ACK and CANCEL are exempt
        assert!(dialog.on_rx_request(&in_dialog(Method::Ack, 1)).is_ok());
    }

    #[test]
    fn test_cseq_check_does_not_commit() {
        let mut dialog = uac();
        let info = in_dialog(Method::Info, 9);
        dialog.check_rx_request(&info).unwrap();
        assert!(dialog.remote_cseq().is_none());

        dialog.accept_rx_request(&info).unwrap();
        assert_eq!(dialog.remote_cseq(), Some(9));
        // A late commit of an older request never lowers the remote CSeq
        dialog.accept_rx_request(&in_dialog(Method::Info, 4)).unwrap();
        assert_eq!(dialog.remote_cseq(), Some(9));
    }

    #[test]
    fn test_route_set_only_before_establishment() {
        let mut dialog = uac();
        let outbound = vec![uri("sip:proxy.example.com;lr")];
        dialog.set_route_set(outbound.clone()).unwrap();
        assert_eq!(dialog.route_set(), &outbound[..]);
        assert_eq!(dialog.next_hop(), &outbound[0]);

        let invite = dialog.create_request(Method::Invite, via());
        assert_eq!(invite.headers.route, outbound);
        let ok = Response::from_request(&invite, StatusCode::OK).with_to_tag("b");
        dialog.on_response(&ok, true).unwrap();
        assert!(matches!(dialog.set_route_set(Vec::new()), Err(Error::InvalidState(_))));

        let mut uas = Dialog::new_uas(&incoming_invite(), None).unwrap();
        assert!(matches!(uas.set_route_set(Vec::new()), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_requests_use_route_set_in_order() {
        let mut dialog = uac();
        dialog.route_set = vec![uri("sip:p1.example.com;lr"), uri("sip:p2.example.com;lr")];
        let start = dialog.local_cseq();
        let request = dialog.create_request(Method::Info, via());
        assert_eq!(request.uri, uri("sip:bob@192.0.2.4"));
        assert_eq!(request.headers.route, dialog.route_set().to_vec());
        assert_eq!(request.cseq_number().unwrap(), start + 1);
        assert_eq!(dialog.next_hop(), &uri("sip:p1.example.com;lr"));
    }

    #[test]
    fn test_strict_router_becomes_request_uri() {
        let mut dialog = uac();
        dialog.route_set = vec![uri("sip:strict.example.com"), uri("sip:p2.example.com;lr")];
        let request = dialog.create_request(Method::Bye, via());
        assert_eq!(request.uri, uri("sip:strict.example.com"));
        assert_eq!(
            request.headers.route,
            vec![uri("sip:p2.example.com;lr"), uri("sip:bob@192.0.2.4")]
        );
    }

    #[test]
    fn test_ack_reuses_invite_cseq() {
        let mut dialog = uac();
        let invite = dialog.create_request(Method::Invite, via());
        let seq = invite.cseq_number().unwrap();
        let ack = dialog.create_request(Method::Ack, via());
        assert_eq!(ack.cseq_number().unwrap(), seq);
        assert_eq!(ack.headers.cseq.as_ref().unwrap().method, Method::Ack);
        let info = dialog.create_request(Method::Info, via());
        assert_eq!(info.cseq_number().unwrap(), seq + 1);
    }

    #[test]
    fn test_uac_state_follows_responses() {
        let mut dialog = uac();
        let invite = dialog.create_request(Method::Invite, via());

        let trying = Response::from_request(&invite, StatusCode::TRYING);
        assert!(!dialog.on_response(&trying, true).unwrap());

        let mut ringing = Response::from_request(&invite, StatusCode::RINGING).with_to_tag("bob-tag");
        ringing.headers.record_route = vec![uri("sip:p1.example.com;lr"), uri("sip:p2.example.com;lr")];
        ringing.headers.contact = Some(NameAddr::new(uri("sip:bob@192.0.2.9")));
        assert!(dialog.on_response(&ringing, true).unwrap());
        assert_eq!(dialog.state(), DialogState::Early);
        assert_eq!(dialog.remote_tag(), Some("bob-tag"));
        assert_eq!(dialog.route_set()[0], uri("sip:p2.example.com;lr"));
        assert_eq!(dialog.remote_target(), &uri("sip:bob@192.0.2.9"));

        let mut ok = Response::from_request(&invite, StatusCode::OK).with_to_tag("bob-tag");
        ok.headers.contact = Some(NameAddr::new(uri("sip:bob@192.0.2.10")));
        assert!(dialog.on_response(&ok, true).unwrap());
        assert_eq!(dialog.state(), DialogState::Established);
        assert_eq!(dialog.remote_target(), &uri("sip:bob@192.0.2.10"));
        assert!(dialog.route_set().is_empty());

        let bye = dialog.create_request(Method::Bye, via());
        let bye_ok = Response::from_request(&bye, StatusCode::OK);
        assert!(dialog.on_response(&bye_ok, true).unwrap());
        assert!(dialog.is_terminated());
    }

    #[test]
    fn test_failure_terminates_early_dialog() {
        let mut dialog = uac();
        let invite = dialog.create_request(Method::Invite, via());
        let busy = Response::from_request(&invite, StatusCode::BUSY_HERE).with_to_tag("t");
        assert!(dialog.on_response(&busy, true).unwrap());
        assert!(dialog.is_terminated());
    }

    #[test]
    fn test_create_response_tags_and_contact() {
        let request = incoming_invite();
        let dialog = Dialog::new_uas(&request, Some(uri("sip:bob@192.0.2.4"))).unwrap();

        let trying = dialog.create_response(&request, StatusCode::TRYING);
        assert!(trying.headers.to_tag().is_none());

        let ok = dialog.create_response(&request, StatusCode::OK);
        assert_eq!(ok.headers.to_tag(), Some(dialog.local_tag()));
        assert_eq!(ok.headers.contact, Some(NameAddr::new(uri("sip:bob@192.0.2.4"))));
        assert_eq!(ok.headers.record_route, request.headers.record_route);

        let busy = dialog.create_response(&request, StatusCode::BUSY_HERE);
        assert!(busy.headers.contact.is_none());
    }

    #[test]
    fn test_stored_ack_matches_cseq() {
        let mut dialog = uac();
        let invite = dialog.create_request(Method::Invite, via());
        let ok = Response::from_request(&invite, StatusCode::OK).with_to_tag("b");
        dialog.on_response(&ok, true).unwrap();
        let ack = dialog.create_ack(&ok, via()).unwrap();
        let seq = invite.cseq_number().unwrap();
        assert_eq!(dialog.stored_ack(seq), Some(&ack));
        assert!(dialog.stored_ack(seq + 1).is_none());
        assert_eq!(ack.headers.to_tag(), Some("b"));
    }

    #[test]
    fn test_fork_keeps_call_identity() {
        let dialog = uac();
        let forked = dialog.fork();
        assert_ne!(forked.id(), dialog.id());
        assert_eq!(forked.call_id(), dialog.call_id());
        assert_eq!(forked.local_tag(), dialog.local_tag());
        assert!(forked.remote_tag().is_none());
    }

    #[test]
    fn test_fork_detection() {
        let mut dialog = uac();
        let invite = dialog.create_request(Method::Invite, via());
        let first = Response::from_request(&invite, StatusCode::RINGING).with_to_tag("b1");
        assert!(!dialog.is_forked_by(&first));
        dialog.on_response(&first, true).unwrap();

        let same = Response::from_request(&invite, StatusCode::OK).with_to_tag("b1");
        assert!(!dialog.is_forked_by(&same));
        let other = Response::from_request(&invite, StatusCode::RINGING).with_to_tag("b2");
        assert!(dialog.is_forked_by(&other));
    }
}
