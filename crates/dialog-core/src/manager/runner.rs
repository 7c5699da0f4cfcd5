//! Async driver for an [`Endpoint`]: feeds it received messages and fires
//! its timers until told to stop.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace};
use voxcore_sip_core::SipMessage;

use super::core::Endpoint;

/// A parsed message handed over by the transport
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub message: SipMessage,
    pub source: SocketAddr,
}

impl InboundMessage {
    pub fn new(message: impl Into<SipMessage>, source: SocketAddr) -> Self {
        InboundMessage {
            message: message.into(),
            source,
        }
    }
}

/// Run `endpoint` until `shutdown` turns true or the inbound channel closes.
///
/// Timers are checked at least every `max_wait` and fired in batches of
/// `poll_batch`. Returns the number of messages processed.
pub async fn run_endpoint(
    endpoint: Arc<Endpoint>,
    mut inbound: mpsc::Receiver<InboundMessage>,
    mut shutdown: watch::Receiver<bool>,
) -> usize {
    let max_wait = endpoint.config().max_wait;
    let batch = endpoint.config().poll_batch.max(1);
    let mut processed = 0;
    info!("endpoint driver started");

    loop {
        if *shutdown.borrow() {
            break;
        }
        let wait = endpoint
            .time_until_next_timer()
            .map_or(max_wait, |due| due.min(max_wait));

        tokio::select! {
            received = inbound.recv() => {
                let Some(InboundMessage { message, source }) = received else {
                    debug!("inbound channel closed");
                    break;
                };
                processed += 1;
                if let Err(error) = endpoint.on_receive(message, source) {
                    debug!(source = %source, error = %error, "inbound message rejected");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::time::sleep(wait) => {}
        }

        let fired = endpoint.poll_timers(batch);
        if fired > 0 {
            trace!(fired, "timers fired");
        }
    }

    info!(processed, "endpoint driver stopped");
    processed
}
