//! Configuration for the endpoint and its transaction timers.
//!
//! Every struct here deserializes from TOML (durations in milliseconds) and
//! falls back to RFC 3261 defaults for missing keys:
//!
//! ```rust
//! use std::time::Duration;
//! use voxcore_dialog_core::config::EndpointConfig;
//! use voxcore_infra_common::config::from_toml_str;
//!
//! let config: EndpointConfig = from_toml_str(r#"
//!     proxy_mode = true
//!     max_transactions = 10000
//!
//!     [timers]
//!     t1 = 250
//! "#).unwrap();
//!
//! assert!(config.proxy_mode);
//! assert_eq!(config.timers.t1, Duration::from_millis(250));
//! assert_eq!(config.timers.t2, Duration::from_secs(4));
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use crate::transaction::timer::TimerSettings;

/// Endpoint-wide behavior switches and resource bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub timers: TimerSettings,

    /// Upper bound on pending timers; `None` grows without limit
    pub max_timers: Option<usize>,

    /// Upper bound on live transactions; `None` grows without limit
    pub max_transactions: Option<usize>,

    /// Timers fired per `poll_timers` call from the driver loop
    pub poll_batch: usize,

    /// Answer every new INVITE with `100 Trying` straight away
    pub auto_100_trying: bool,

    /// Run Timer C on INVITE client transactions
    pub proxy_mode: bool,

    /// Let the dialog layer ACK 2xx responses to INVITE by itself
    pub auto_ack_2xx: bool,

    /// Longest the driver loop sleeps between timer checks
    #[serde(with = "duration_ms")]
    pub max_wait: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        EndpointConfig {
            timers: TimerSettings::default(),
            max_timers: None,
            max_transactions: None,
            poll_batch: 64,
            auto_100_trying: false,
            proxy_mode: false,
            auto_ack_2xx: true,
            max_wait: Duration::from_millis(50),
        }
    }
}

impl EndpointConfig {
    /// Load from a TOML file; missing keys keep their defaults
    pub fn load(path: impl AsRef<Path>) -> voxcore_infra_common::Result<Self> {
        voxcore_infra_common::config::load_toml(path)
    }

    pub fn with_timers(mut self, timers: TimerSettings) -> Self {
        self.timers = timers;
        self
    }

    pub fn with_max_timers(mut self, limit: usize) -> Self {
        self.max_timers = Some(limit);
        self
    }

    pub fn with_max_transactions(mut self, limit: usize) -> Self {
        self.max_transactions = Some(limit);
        self
    }

    pub fn with_auto_100_trying(mut self, enabled: bool) -> Self {
        self.auto_100_trying = enabled;
        self
    }

    pub fn with_proxy_mode(mut self, enabled: bool) -> Self {
        self.proxy_mode = enabled;
        self
    }

    pub fn with_auto_ack_2xx(mut self, enabled: bool) -> Self {
        self.auto_ack_2xx = enabled;
        self
    }
}

/// Serde adapter storing a [`Duration`] as whole milliseconds
pub mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
