//! Shared fixtures for the endpoint integration tests
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use voxcore_dialog_core::prelude::*;
use voxcore_dialog_core::testing::{MockTransport, RecordingObserver};
use voxcore_dialog_core::transaction::timer::ManualClock;
use voxcore_sip_core::prelude::*;

/// Address of the remote user agent in every test
pub fn remote() -> SocketAddr {
    "192.0.2.4:5060".parse().unwrap()
}

pub fn uri(text: &str) -> Uri {
    text.parse().unwrap()
}

pub struct Harness {
    pub endpoint: Arc<Endpoint>,
    pub transport: Arc<MockTransport>,
    pub clock: Arc<ManualClock>,
    pub observer: Arc<RecordingObserver>,
}

impl Harness {
    pub fn new(config: EndpointConfig) -> Self {
        Self::with_transport(config, MockTransport::udp())
    }

    pub fn with_transport(config: EndpointConfig, transport: MockTransport) -> Self {
        let transport = Arc::new(transport);
        let clock = Arc::new(ManualClock::new());
        let endpoint = Arc::new(Endpoint::with_clock(config, transport.clone(), clock.clone()));
        let observer = Arc::new(RecordingObserver::new());
        endpoint.add_transaction_observer(observer.clone());
        endpoint.add_dialog_observer(observer.clone());
        Harness {
            endpoint,
            transport,
            clock,
            observer,
        }
    }

    pub fn udp() -> Self {
        Self::new(EndpointConfig::default())
    }

    /// Move the clock forward and fire whatever became due
    pub fn advance(&self, by: Duration) -> usize {
        self.clock.advance(by);
        self.endpoint.poll_timers(1024)
    }

    /// Advance in `step`s until `total` has passed
    pub fn advance_in_steps(&self, total: Duration, step: Duration) {
        let mut elapsed = Duration::ZERO;
        while elapsed < total {
            self.advance(step);
            elapsed += step;
        }
    }

    pub fn receive(&self, message: impl Into<SipMessage>) -> voxcore_dialog_core::Result<()> {
        self.endpoint.on_receive(message.into(), remote())
    }

    /// INVITE from this endpoint to the remote UA, outside any dialog
    pub fn outgoing(&self, method: Method) -> Request {
        RequestBuilder::new(method, uri("sip:bob@192.0.2.4:5060"))
            .via(self.endpoint.new_via())
            .from(NameAddr::new(uri("sip:alice@127.0.0.1")).with_tag("atag"))
            .to(NameAddr::new(uri("sip:bob@192.0.2.4")))
            .call_id(generate_call_id())
            .cseq(1)
            .contact(NameAddr::new(uri("sip:alice@127.0.0.1:5060")))
            .build()
    }

    pub fn last_state(&self, key: &TransactionKey) -> Option<TransactionState> {
        self.observer.changes_for(key).last().map(|change| change.current)
    }
}

/// Request sent by the remote UA to this endpoint
pub fn incoming(method: Method, branch: &str, call_id: &str, cseq: u32) -> Request {
    RequestBuilder::new(method, uri("sip:alice@127.0.0.1:5060"))
        .via(Via::udp("192.0.2.4", Some(5060), branch))
        .from(NameAddr::new(uri("sip:bob@192.0.2.4")).with_tag("btag"))
        .to(NameAddr::new(uri("sip:alice@127.0.0.1")))
        .call_id(call_id)
        .cseq(cseq)
        .contact(NameAddr::new(uri("sip:bob@192.0.2.4:5070")))
        .build()
}

/// Same as [`incoming`] but inside the dialog identified by `local_tag`
pub fn incoming_in_dialog(method: Method, branch: &str, call_id: &str, cseq: u32, local_tag: &str) -> Request {
    let mut request = incoming(method, branch, call_id, cseq);
    if let Some(to) = request.headers.to.as_mut() {
        to.tag = Some(local_tag.to_string());
    }
    request
}

/// Response from the remote UA, optionally tagged and with a Contact
pub fn answer(request: &Request, status: StatusCode, to_tag: Option<&str>) -> Response {
    let mut response = Response::from_request(request, status);
    if let Some(tag) = to_tag {
        response = response.with_to_tag(tag);
    }
    if request.method.creates_dialog() && status.as_u16() > 100 && status.as_u16() < 300 {
        response.headers.contact = Some(NameAddr::new(uri("sip:bob@192.0.2.4:5070")));
    }
    response
}
