//! # SIP messages
//!
//! [`Request`], [`Response`] and the [`SipMessage`] wrapper the transport hands
//! to the core. Mandatory headers are optional at the type level because a
//! parser may deliver a message missing them; the accessor methods on
//! [`Headers`] turn that into [`Error::MissingHeader`].
//!
//! `Display` writes the message in wire form, which is what the transaction
//! layer passes to the transport.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::header::{CSeq, NameAddr, Via};
use crate::method::Method;
use crate::status::StatusCode;
use crate::uri::Uri;

/// Headers shared by requests and responses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers {
    /// Topmost first
    pub via: Vec<Via>,
    pub from: Option<NameAddr>,
    pub to: Option<NameAddr>,
    pub call_id: Option<String>,
    pub cseq: Option<CSeq>,
    pub contact: Option<NameAddr>,
    /// In message order
    pub record_route: Vec<Uri>,
    /// In message order
    pub route: Vec<Uri>,
    pub max_forwards: Option<u32>,
    /// Everything else, passed through untouched
    pub other: Vec<(String, String)>,
}

impl Headers {
    pub fn top_via(&self) -> Result<&Via> {
        self.via.first().ok_or(Error::MissingHeader("Via"))
    }

    pub fn from(&self) -> Result<&NameAddr> {
        self.from.as_ref().ok_or(Error::MissingHeader("From"))
    }

    pub fn to(&self) -> Result<&NameAddr> {
        self.to.as_ref().ok_or(Error::MissingHeader("To"))
    }

    pub fn call_id(&self) -> Result<&str> {
        self.call_id.as_deref().ok_or(Error::MissingHeader("Call-ID"))
    }

    pub fn cseq(&self) -> Result<&CSeq> {
        self.cseq.as_ref().ok_or(Error::MissingHeader("CSeq"))
    }

    pub fn from_tag(&self) -> Option<&str> {
        self.from.as_ref().and_then(|f| f.tag())
    }

    pub fn to_tag(&self) -> Option<&str> {
        self.to.as_ref().and_then(|t| t.tag())
    }

    fn write(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for via in &self.via {
            write!(f, "Via: {}\r\n", via)?;
        }
        for route in &self.route {
            write!(f, "Route: <{}>\r\n", route)?;
        }
        for rr in &self.record_route {
            write!(f, "Record-Route: <{}>\r\n", rr)?;
        }
        if let Some(max_forwards) = self.max_forwards {
            write!(f, "Max-Forwards: {}\r\n", max_forwards)?;
        }
        if let Some(from) = &self.from {
            write!(f, "From: {}\r\n", from)?;
        }
        if let Some(to) = &self.to {
            write!(f, "To: {}\r\n", to)?;
        }
        if let Some(call_id) = &self.call_id {
            write!(f, "Call-ID: {}\r\n", call_id)?;
        }
        if let Some(cseq) = &self.cseq {
            write!(f, "CSeq: {}\r\n", cseq)?;
        }
        if let Some(contact) = &self.contact {
            write!(f, "Contact: {}\r\n", contact)?;
        }
        for (name, value) in &self.other {
            write!(f, "{}: {}\r\n", name, value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub method: Method,
    pub uri: Uri,
    pub headers: Headers,
    pub body: Bytes,
}

impl Request {
    pub fn new(method: Method, uri: Uri) -> Self {
        Request {
            method,
            uri,
            headers: Headers::default(),
            body: Bytes::new(),
        }
    }

    /// Branch of the topmost Via, if any
    pub fn branch(&self) -> Option<&str> {
        self.headers.via.first().and_then(|v| v.branch())
    }

    pub fn cseq_number(&self) -> Result<u32> {
        Ok(self.headers.cseq()?.seq)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} SIP/2.0\r\n", self.method, self.uri)?;
        self.headers.write(f)?;
        write_body(f, &self.body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: StatusCode,
    pub reason: String,
    pub headers: Headers,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Response {
            status,
            reason: status.reason_phrase().to_string(),
            headers: Headers::default(),
            body: Bytes::new(),
        }
    }

    /// Build a response to `request` as described in RFC 3261 section 8.2.6.2:
    /// Via, From, To, Call-ID and CSeq are copied. The To-tag is left to the
    /// caller.
    pub fn from_request(request: &Request, status: StatusCode) -> Self {
        let mut response = Response::new(status);
        response.headers.via = request.headers.via.clone();
        response.headers.from = request.headers.from.clone();
        response.headers.to = request.headers.to.clone();
        response.headers.call_id = request.headers.call_id.clone();
        response.headers.cseq = request.headers.cseq.clone();
        response
    }

    pub fn with_to_tag(mut self, tag: impl Into<String>) -> Self {
        if let Some(to) = self.headers.to.as_mut() {
            to.tag = Some(tag.into());
        }
        self
    }

    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn is_provisional(&self) -> bool {
        self.status.is_provisional()
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_final(&self) -> bool {
        self.status.is_final()
    }

    /// Method of the request this response answers, from CSeq
    pub fn cseq_method(&self) -> Result<&Method> {
        Ok(&self.headers.cseq()?.method)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIP/2.0 {} {}\r\n", self.status, self.reason)?;
        self.headers.write(f)?;
        write_body(f, &self.body)
    }
}

fn write_body(f: &mut fmt::Formatter<'_>, body: &Bytes) -> fmt::Result {
    write!(f, "Content-Length: {}\r\n\r\n", body.len())?;
    if !body.is_empty() {
        f.write_str(&String::from_utf8_lossy(body))?;
    }
    Ok(())
}

/// A parsed request or response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SipMessage {
    Request(Request),
    Response(Response),
}

impl SipMessage {
    pub fn headers(&self) -> &Headers {
        match self {
            SipMessage::Request(r) => &r.headers,
            SipMessage::Response(r) => &r.headers,
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self, SipMessage::Request(_))
    }

    pub fn as_request(&self) -> Option<&Request> {
        match self {
            SipMessage::Request(r) => Some(r),
            SipMessage::Response(_) => None,
        }
    }

    pub fn as_response(&self) -> Option<&Response> {
        match self {
            SipMessage::Response(r) => Some(r),
            SipMessage::Request(_) => None,
        }
    }

    /// Wire form handed to the transport
    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.to_string())
    }

    /// Short description for log lines, e.g. `INVITE` or `180 Ringing`
    pub fn summary(&self) -> String {
        match self {
            SipMessage::Request(r) => r.method.to_string(),
            SipMessage::Response(r) => format!("{} {}", r.status, r.reason),
        }
    }
}

impl fmt::Display for SipMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SipMessage::Request(r) => r.fmt(f),
            SipMessage::Response(r) => r.fmt(f),
        }
    }
}

impl From<Request> for SipMessage {
    fn from(request: Request) -> Self {
        SipMessage::Request(request)
    }
}

impl From<Response> for SipMessage {
    fn from(response: Response) -> Self {
        SipMessage::Response(response)
    }
}
