//! Structured forms of the headers the transaction and dialog layers read:
//! `Via`, `From`/`To`/`Contact` (as [`NameAddr`]) and `CSeq`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::method::Method;
use crate::uri::Uri;

/// Branch prefix marking an RFC 3261 compliant sender
pub const RFC3261_BRANCH_MAGIC: &str = "z9hG4bK";

/// A single Via entry, e.g. `SIP/2.0/UDP pc33.atlanta.com:5060;branch=z9hG4bK776asdhds`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Via {
    /// Transport token (`UDP`, `TCP`, `TLS`, ...)
    pub transport: String,
    pub host: String,
    pub port: Option<u16>,
    pub branch: Option<String>,
    /// Source address stamped by the server that received the request
    pub received: Option<String>,
}

impl Via {
    pub fn new(
        transport: impl Into<String>,
        host: impl Into<String>,
        port: Option<u16>,
        branch: Option<String>,
    ) -> Self {
        Via {
            transport: transport.into(),
            host: host.into(),
            port,
            branch,
            received: None,
        }
    }

    pub fn udp(host: impl Into<String>, port: Option<u16>, branch: impl Into<String>) -> Self {
        Self::new("UDP", host, port, Some(branch.into()))
    }

    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    /// `host:port` of the sender; the port defaults to 5060 when absent
    pub fn sent_by(&self) -> String {
        format!("{}:{}", self.host, self.port.unwrap_or(5060))
    }

    /// True when the branch carries the RFC 3261 magic cookie
    pub fn has_rfc3261_branch(&self) -> bool {
        self.branch
            .as_deref()
            .and_then(|b| b.get(..RFC3261_BRANCH_MAGIC.len()))
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(RFC3261_BRANCH_MAGIC))
    }
}

impl fmt::Display for Via {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIP/2.0/{} {}", self.transport, self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        if let Some(branch) = &self.branch {
            write!(f, ";branch={}", branch)?;
        }
        if let Some(received) = &self.received {
            write!(f, ";received={}", received)?;
        }
        Ok(())
    }
}

/// `name-addr` with an optional tag, used for From, To and Contact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameAddr {
    pub display_name: Option<String>,
    pub uri: Uri,
    pub tag: Option<String>,
}

impl NameAddr {
    pub fn new(uri: Uri) -> Self {
        NameAddr {
            display_name: None,
            uri,
            tag: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }
}

impl fmt::Display for NameAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.display_name {
            write!(f, "\"{}\" ", name)?;
        }
        write!(f, "<{}>", self.uri)?;
        if let Some(tag) = &self.tag {
            write!(f, ";tag={}", tag)?;
        }
        Ok(())
    }
}

/// `CSeq: <seq> <METHOD>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CSeq {
    pub seq: u32,
    pub method: Method,
}

impl CSeq {
    pub fn new(seq: u32, method: Method) -> Self {
        CSeq { seq, method }
    }
}

impl fmt::Display for CSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.seq, self.method)
    }
}
