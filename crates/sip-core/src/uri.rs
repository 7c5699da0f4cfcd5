//! # SIP URIs
//!
//! A small structured form of `sip:`/`sips:` URIs
//! ([RFC 3261 Section 19.1](https://datatracker.ietf.org/doc/html/rfc3261#section-19.1)),
//! enough for dialog targets, route sets and next-hop selection.
//!
//! ```rust
//! use voxcore_sip_core::Uri;
//!
//! let route: Uri = "<sip:proxy.example.com:5070;lr>".parse().unwrap();
//! assert!(route.is_loose_route());
//! assert_eq!(route.port, Some(5070));
//! assert_eq!(route.to_string(), "sip:proxy.example.com:5070;lr");
//! ```

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scheme {
    Sip,
    Sips,
}

impl Scheme {
    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Sip => 5060,
            Scheme::Sips => 5061,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Sip => f.write_str("sip"),
            Scheme::Sips => f.write_str("sips"),
        }
    }
}

/// A `sip:` or `sips:` URI
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Uri {
    pub scheme: Scheme,
    pub user: Option<String>,
    pub host: String,
    pub port: Option<u16>,
    /// URI parameters in order of appearance; flag parameters have no value
    pub params: Vec<(String, Option<String>)>,
}

impl Uri {
    pub fn sip(host: impl Into<String>) -> Self {
        Uri {
            scheme: Scheme::Sip,
            user: None,
            host: host.into(),
            port: None,
            params: Vec::new(),
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: Option<String>) -> Self {
        self.params.push((name.into(), value));
        self
    }

    /// `sips:` URIs require TLS on every hop
    pub fn is_secure(&self) -> bool {
        self.scheme == Scheme::Sips
    }

    /// Carries the `lr` parameter of a loose router
    pub fn is_loose_route(&self) -> bool {
        self.param("lr").is_some()
    }

    /// `Some(None)` for a flag parameter, `Some(Some(v))` for a valued one
    pub fn param(&self, name: &str) -> Option<Option<&str>> {
        self.params
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_deref())
    }

    /// Resolve the URI to a socket address.
    ///
    /// Only literal IP hosts are accepted; name resolution belongs to the
    /// transport collaborator.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let host = self.host.trim_start_matches('[').trim_end_matches(']');
        let ip: IpAddr = host
            .parse()
            .map_err(|_| Error::InvalidUri(format!("{} is not a literal IP address", self.host)))?;
        Ok(SocketAddr::new(ip, self.port.unwrap_or_else(|| self.scheme.default_port())))
    }

    /// `host[:port]` as written
    pub fn host_port(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.clone(),
        }
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme)?;
        if let Some(user) = &self.user {
            write!(f, "{}@", user)?;
        }
        f.write_str(&self.host_port())?;
        for (name, value) in &self.params {
            match value {
                Some(value) => write!(f, ";{}={}", name, value)?,
                None => write!(f, ";{}", name)?,
            }
        }
        Ok(())
    }
}

impl FromStr for Uri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim().trim_start_matches('<').trim_end_matches('>');
        let invalid = || Error::InvalidUri(s.to_string());

        let (scheme, rest) = if let Some(rest) = text.strip_prefix("sips:") {
            (Scheme::Sips, rest)
        } else if let Some(rest) = text.strip_prefix("sip:") {
            (Scheme::Sip, rest)
        } else {
            return Err(invalid());
        };

        // Headers (`?`) are not kept.
        let rest = rest.split('?').next().unwrap_or_default();
        let mut parts = rest.split(';');
        let address = parts.next().ok_or_else(invalid)?;

        let (user, hostport) = match address.rsplit_once('@') {
            Some((user, hostport)) => (Some(user.to_string()), hostport),
            None => (None, address),
        };

        let (host, port) = if let Some(stripped) = hostport.strip_prefix('[') {
            let (v6, after) = stripped.split_once(']').ok_or_else(invalid)?;
            let port = match after.strip_prefix(':') {
                Some(p) => Some(p.parse::<u16>().map_err(|_| invalid())?),
                None => None,
            };
            (format!("[{}]", v6), port)
        } else {
            match hostport.split_once(':') {
                Some((host, port)) => {
                    (host.to_string(), Some(port.parse::<u16>().map_err(|_| invalid())?))
                }
                None => (hostport.to_string(), None),
            }
        };

        if host.is_empty() {
            return Err(invalid());
        }

        let params = parts
            .filter(|p| !p.is_empty())
            .map(|p| match p.split_once('=') {
                Some((name, value)) => (name.to_string(), Some(value.to_string())),
                None => (p.to_string(), None),
            })
            .collect();

        Ok(Uri { scheme, user, host, port, params })
    }
}
