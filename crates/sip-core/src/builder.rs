//! Request construction and identifier generation

use bytes::Bytes;
use rand::Rng;
use uuid::Uuid;

use crate::header::{CSeq, NameAddr, RFC3261_BRANCH_MAGIC, Via};
use crate::message::Request;
use crate::method::Method;
use crate::uri::Uri;

/// New RFC 3261 branch: the magic cookie followed by 64 random bits
pub fn generate_branch() -> String {
    format!("{}{:016x}", RFC3261_BRANCH_MAGIC, rand::thread_rng().r#gen::<u64>())
}

/// New From/To tag carrying 64 random bits
pub fn generate_tag() -> String {
    format!("{:016x}", rand::thread_rng().r#gen::<u64>())
}

pub fn generate_call_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Fluent builder for [`Request`]. The CSeq method always follows the
/// request method.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    pub fn new(method: Method, uri: Uri) -> Self {
        let mut request = Request::new(method, uri);
        request.headers.max_forwards = Some(70);
        RequestBuilder { request }
    }

    pub fn via(mut self, via: Via) -> Self {
        self.request.headers.via.push(via);
        self
    }

    pub fn from(mut self, from: NameAddr) -> Self {
        self.request.headers.from = Some(from);
        self
    }

    pub fn to(mut self, to: NameAddr) -> Self {
        self.request.headers.to = Some(to);
        self
    }

    pub fn call_id(mut self, call_id: impl Into<String>) -> Self {
        self.request.headers.call_id = Some(call_id.into());
        self
    }

    pub fn cseq(mut self, seq: u32) -> Self {
        let method = self.request.method.clone();
        self.request.headers.cseq = Some(CSeq::new(seq, method));
        self
    }

    pub fn contact(mut self, contact: NameAddr) -> Self {
        self.request.headers.contact = Some(contact);
        self
    }

    pub fn route(mut self, route: Uri) -> Self {
        self.request.headers.route.push(route);
        self
    }

    pub fn record_route(mut self, route: Uri) -> Self {
        self.request.headers.record_route.push(route);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.other.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.request.body = body.into();
        self
    }

    pub fn build(self) -> Request {
        self.request
    }
}
