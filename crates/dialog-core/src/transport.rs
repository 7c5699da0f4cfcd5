//! The transport seam.
//!
//! Socket I/O, framing and parsing live outside this crate. The endpoint only
//! needs to hand serialized bytes to something that can send them, and to know
//! whether that something is reliable (which zeroes several RFC 3261 timers).
//! Inbound traffic arrives as already-parsed messages through
//! [`Endpoint::on_receive`](crate::manager::Endpoint::on_receive).

use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::errors::TransportError;

/// Transport protocol of a [`Transport`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportProtocol {
    Udp,
    Tcp,
    Tls,
}

impl TransportProtocol {
    /// TCP and TLS deliver in order without loss, so no retransmissions
    pub fn is_reliable(self) -> bool {
        matches!(self, TransportProtocol::Tcp | TransportProtocol::Tls)
    }

    /// Token used in the Via header
    pub fn via_token(self) -> &'static str {
        match self {
            TransportProtocol::Udp => "UDP",
            TransportProtocol::Tcp => "TCP",
            TransportProtocol::Tls => "TLS",
        }
    }
}

impl fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.via_token())
    }
}

/// Outbound half of the transport layer.
///
/// `send` must not block for long: it is called with a transaction lock held.
pub trait Transport: Send + Sync + fmt::Debug {
    fn send(&self, data: &[u8], destination: SocketAddr) -> Result<(), TransportError>;

    /// Address placed in the Via sent-by of locally generated requests
    fn local_addr(&self) -> SocketAddr;

    fn protocol(&self) -> TransportProtocol {
        TransportProtocol::Udp
    }

    fn is_reliable(&self) -> bool {
        self.protocol().is_reliable()
    }
}
