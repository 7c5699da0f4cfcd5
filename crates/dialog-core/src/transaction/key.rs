//! Transaction matching keys (RFC 3261 sections 17.1.3 and 17.2.3).
//!
//! A key has the form `role$METHOD$branch`. The method is left out for INVITE
//! and ACK, so the ACK for a non-2xx final response (which reuses the INVITE
//! branch) lands on the INVITE server transaction. A CANCEL also reuses the
//! INVITE branch but keeps its own method and therefore its own transaction.
//! An ACK for a 2xx carries a fresh branch and matches nothing here; the
//! dialog layer hands it to the INVITE server transaction it acknowledges.
//!
//! Senders that predate RFC 3261 (no `z9hG4bK` cookie) get a composite key:
//! role, method, CSeq number, From tag, Call-ID and top Via sent-by.

use std::fmt;

use serde::{Deserialize, Serialize};
use voxcore_sip_core::{Headers, Method, Request, Response, SipMessage};

use super::state::TransactionRole;
use crate::errors::Result;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionKey(String);

impl TransactionKey {
    /// Key of the transaction a request belongs to, seen from `role`
    pub fn for_request(request: &Request, role: TransactionRole) -> Result<Self> {
        Self::build(role, &request.method, &request.headers)
    }

    /// Key of the client transaction a response belongs to
    pub fn for_response(response: &Response) -> Result<Self> {
        let method = response.cseq_method()?;
        Self::build(TransactionRole::Uac, method, &response.headers)
    }

    /// Key used to match an incoming message: requests match server
    /// transactions, responses match client transactions
    pub fn for_incoming(message: &SipMessage) -> Result<Self> {
        match message {
            SipMessage::Request(request) => Self::for_request(request, TransactionRole::Uas),
            SipMessage::Response(response) => Self::for_response(response),
        }
    }

    /// Key of the INVITE server transaction a CANCEL refers to
    pub fn invite_for_cancel(cancel: &Request) -> Result<Self> {
        Self::build(TransactionRole::Uas, &Method::Invite, &cancel.headers)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn build(role: TransactionRole, method: &Method, headers: &Headers) -> Result<Self> {
        let via = headers.top_via()?;
        let role = match role {
            TransactionRole::Uac => "c",
            TransactionRole::Uas => "s",
        };
        let method = if method.is_invite_or_ack() {
            String::new()
        } else {
            format!("{}$", method)
        };

        if via.has_rfc3261_branch() {
            let branch = via.branch().unwrap_or_default().to_ascii_lowercase();
            return Ok(TransactionKey(format!("{}${}{}", role, method, branch)));
        }

        let cseq = headers.cseq()?;
        let call_id = headers.call_id()?;
        let from_tag = headers.from()?.tag().unwrap_or_default();
        Ok(TransactionKey(format!(
            "{}${}{}${}${}${}",
            role,
            method,
            cseq.seq,
            from_tag,
            call_id,
            via.sent_by()
        )))
    }
}

impl fmt::Display for TransactionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use voxcore_sip_core::{NameAddr, RequestBuilder, StatusCode, Uri, Via};

    fn request(method: Method, branch: Option<&str>) -> Request {
        let via = Via::new("UDP", "192.0.2.1", Some(5060), branch.map(str::to_string));
        RequestBuilder::new(method, "sip:bob@192.0.2.4".parse().unwrap())
            .via(via)
            .from(NameAddr::new(Uri::sip("192.0.2.1")).with_tag("fromtag"))
            .to(NameAddr::new(Uri::sip("192.0.2.4")))
            .call_id("call-1")
            .cseq(12)
            .build()
    }

    #[test]
    fn test_branch_is_case_insensitive() {
        let upper = request(Method::Options, Some("z9hG4bKABCdef"));
        let lower = request(Method::Options, Some("z9hg4bkabcdef"));
        assert_eq!(
            TransactionKey::for_request(&upper, TransactionRole::Uas).unwrap(),
            TransactionKey::for_request(&lower, TransactionRole::Uas).unwrap()
        );
    }

    #[test]
    fn test_ack_matches_invite_but_cancel_does_not() {
        let invite = TransactionKey::for_request(&request(Method::Invite, Some("z9hG4bK1")), TransactionRole::Uas).unwrap();
        let ack = TransactionKey::for_request(&request(Method::Ack, Some("z9hG4bK1")), TransactionRole::Uas).unwrap();
        let cancel = TransactionKey::for_request(&request(Method::Cancel, Some("z9hG4bK1")), TransactionRole::Uas).unwrap();
        assert_eq!(invite, ack);
        assert_ne!(invite, cancel);
        assert_eq!(TransactionKey::invite_for_cancel(&request(Method::Cancel, Some("z9hG4bK1"))).unwrap(), invite);
    }

    #[test]
    fn test_response_matches_client_transaction_by_cseq_method() {
        let bye = request(Method::Bye, Some("z9hG4bKbye"));
        let client = TransactionKey::for_request(&bye, TransactionRole::Uac).unwrap();
        let server = TransactionKey::for_request(&bye, TransactionRole::Uas).unwrap();
        assert_ne!(client, server);

        let ok = Response::from_request(&bye, StatusCode::OK);
        assert_eq!(TransactionKey::for_response(&ok).unwrap(), client);

        let mut wrong_method = ok.clone();
        wrong_method.headers.cseq.as_mut().unwrap().method = Method::Info;
        assert_ne!(TransactionKey::for_response(&wrong_method).unwrap(), client);
    }

    #[test]
    fn test_legacy_key() {
        let legacy = request(Method::Invite, Some("1234abcd"));
        let key = TransactionKey::for_request(&legacy, TransactionRole::Uas).unwrap();
        assert_eq!(key.as_str(), "s$12$fromtag$call-1$192.0.2.1:5060");

        let ack = request(Method::Ack, None);
        assert_eq!(TransactionKey::for_request(&ack, TransactionRole::Uas).unwrap(), key);
    }

    #[test]
    fn test_missing_headers_are_bad_argument() {
        let mut no_via = request(Method::Options, Some("z9hG4bK1"));
        no_via.headers.via.clear();
        assert!(matches!(
            TransactionKey::for_request(&no_via, TransactionRole::Uas),
            Err(Error::BadArgument(_))
        ));

        let mut legacy_no_call_id = request(Method::Options, None);
        legacy_no_call_id.headers.call_id = None;
        assert!(matches!(
            TransactionKey::for_request(&legacy_no_call_id, TransactionRole::Uas),
            Err(Error::BadArgument(_))
        ));
    }
}
