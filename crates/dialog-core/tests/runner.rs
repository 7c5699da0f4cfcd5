//! The async driver under tokio's paused clock

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{answer, remote, uri};
use serial_test::serial;
use tokio::sync::{mpsc, watch};
use tracing::Level;
use voxcore_dialog_core::prelude::*;
use voxcore_dialog_core::testing::MockTransport;
use voxcore_dialog_core::transaction::timer::TokioClock;
use voxcore_infra_common::{LoggingConfig, setup_logging};
use voxcore_sip_core::prelude::*;

fn endpoint() -> (Arc<Endpoint>, Arc<MockTransport>) {
    // Only the first install in this binary succeeds
    let _ = setup_logging(LoggingConfig::new(Level::DEBUG, "endpoint-runner"));
    let transport = Arc::new(MockTransport::udp());
    let endpoint = Endpoint::with_clock(EndpointConfig::default(), transport.clone(), Arc::new(TokioClock));
    (Arc::new(endpoint), transport)
}

fn invite(endpoint: &Endpoint) -> Request {
    RequestBuilder::new(Method::Invite, uri("sip:bob@192.0.2.4"))
        .via(endpoint.new_via())
        .from(NameAddr::new(uri("sip:alice@127.0.0.1")).with_tag("a1"))
        .to(NameAddr::new(uri("sip:bob@192.0.2.4")))
        .call_id(generate_call_id())
        .cseq(1)
        .build()
}

#[tokio::test(start_paused = true)]
#[serial]
async fn test_driver_fires_timers_and_delivers_messages() {
    let (endpoint, transport) = endpoint();
    let (inbound_tx, inbound_rx) = mpsc::channel(16);
    let (stop_tx, stop_rx) = watch::channel(false);
    let driver = tokio::spawn(run_endpoint(endpoint.clone(), inbound_rx, stop_rx));

    let request = invite(&endpoint);
    let key = endpoint.send_request(request.clone(), remote()).unwrap();

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(transport.count_starting_with("INVITE "), 2);

    inbound_tx
        .send(InboundMessage::new(answer(&request, StatusCode::OK, Some("b1")), remote()))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!endpoint.has_transaction(&key));
    assert_eq!(endpoint.pending_timers(), 0);

    stop_tx.send(true).unwrap();
    let processed = driver.await.unwrap();
    assert_eq!(processed, 1);
}

#[tokio::test(start_paused = true)]
#[serial]
async fn test_driver_times_out_transactions() {
    let (endpoint, _transport) = endpoint();
    let (_inbound_tx, inbound_rx) = mpsc::channel::<InboundMessage>(16);
    let (stop_tx, stop_rx) = watch::channel(false);
    let driver = tokio::spawn(run_endpoint(endpoint.clone(), inbound_rx, stop_rx));

    let key = endpoint.send_request(invite(&endpoint), remote()).unwrap();
    tokio::time::sleep(Duration::from_secs(33)).await;
    assert!(!endpoint.has_transaction(&key));

    stop_tx.send(true).unwrap();
    driver.await.unwrap();
}

#[tokio::test(start_paused = true)]
#[serial]
async fn test_driver_stops_when_inbound_closes() {
    let (endpoint, _transport) = endpoint();
    let (inbound_tx, inbound_rx) = mpsc::channel::<InboundMessage>(16);
    let (_stop_tx, stop_rx) = watch::channel(false);
    let driver = tokio::spawn(run_endpoint(endpoint, inbound_rx, stop_rx));

    drop(inbound_tx);
    assert_eq!(driver.await.unwrap(), 0);
}
