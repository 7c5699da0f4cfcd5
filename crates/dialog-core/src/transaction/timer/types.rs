use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::duration_ms;

/// The RFC 3261 transaction timers.
///
/// A, E and G drive retransmissions; B, F and H bound the wait for a
/// response or ACK; D, I, J and K hold a completed transaction long enough
/// to absorb retransmissions; C guards a proxied INVITE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionTimer {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
}

impl TransactionTimer {
    /// B, C, F and H end the transaction with a timeout
    pub fn is_timeout(self) -> bool {
        matches!(
            self,
            TransactionTimer::B | TransactionTimer::C | TransactionTimer::F | TransactionTimer::H
        )
    }

    pub fn is_retransmission(self) -> bool {
        matches!(self, TransactionTimer::A | TransactionTimer::E | TransactionTimer::G)
    }
}

impl fmt::Display for TransactionTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionTimer::A => "A",
            TransactionTimer::B => "B",
            TransactionTimer::C => "C",
            TransactionTimer::D => "D",
            TransactionTimer::E => "E",
            TransactionTimer::F => "F",
            TransactionTimer::G => "G",
            TransactionTimer::H => "H",
            TransactionTimer::I => "I",
            TransactionTimer::J => "J",
            TransactionTimer::K => "K",
        };
        f.write_str(name)
    }
}

/// Base timer values from RFC 3261 Table 4.
///
/// Serialized as milliseconds, e.g. `t1 = 500`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerSettings {
    /// RTT estimate
    #[serde(with = "duration_ms")]
    pub t1: Duration,
    /// Maximum retransmit interval for non-INVITE requests and INVITE responses
    #[serde(with = "duration_ms")]
    pub t2: Duration,
    /// Maximum duration a message remains in the network
    #[serde(with = "duration_ms")]
    pub t4: Duration,
    /// Timer D on unreliable transports
    #[serde(with = "duration_ms")]
    pub td: Duration,
    /// Proxy INVITE timeout
    #[serde(with = "duration_ms")]
    pub timer_c: Duration,
}

impl Default for TimerSettings {
    fn default() -> Self {
        TimerSettings {
            t1: Duration::from_millis(500),
            t2: Duration::from_secs(4),
            t4: Duration::from_secs(5),
            td: Duration::from_secs(32),
            timer_c: Duration::from_secs(180),
        }
    }
}

impl TimerSettings {
    pub fn with_t1(mut self, t1: Duration) -> Self {
        self.t1 = t1;
        self
    }

    pub fn with_t2(mut self, t2: Duration) -> Self {
        self.t2 = t2;
        self
    }

    pub fn with_t4(mut self, t4: Duration) -> Self {
        self.t4 = t4;
        self
    }

    /// 64*T1, shared by B, F, H and (on UDP) J
    pub fn transaction_timeout(&self) -> Duration {
        self.t1 * 64
    }

    /// Initial duration of `timer`, accounting for transport reliability.
    ///
    /// Retransmission timers start at T1; on a reliable transport they are
    /// never armed, which the state machine handles itself.
    pub fn duration(&self, timer: TransactionTimer, reliable: bool) -> Duration {
        let unless_reliable = |d: Duration| if reliable { Duration::ZERO } else { d };
        match timer {
            TransactionTimer::A | TransactionTimer::E | TransactionTimer::G => self.t1,
            TransactionTimer::B | TransactionTimer::F | TransactionTimer::H => {
                self.transaction_timeout()
            }
            TransactionTimer::C => self.timer_c,
            TransactionTimer::D => unless_reliable(self.td),
            TransactionTimer::I | TransactionTimer::K => unless_reliable(self.t4),
            TransactionTimer::J => unless_reliable(self.transaction_timeout()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc_defaults() {
        let settings = TimerSettings::default();
        assert_eq!(settings.t1, Duration::from_millis(500));
        assert_eq!(settings.duration(TransactionTimer::B, false), Duration::from_secs(32));
        assert_eq!(settings.duration(TransactionTimer::D, false), Duration::from_secs(32));
        assert_eq!(settings.duration(TransactionTimer::K, false), Duration::from_secs(5));
        assert_eq!(settings.duration(TransactionTimer::J, false), Duration::from_secs(32));
    }

    #[test]
    fn test_reliable_transport_zeroes_wait_timers() {
        let settings = TimerSettings::default();
        for timer in [TransactionTimer::D, TransactionTimer::I, TransactionTimer::J, TransactionTimer::K] {
            assert_eq!(settings.duration(timer, true), Duration::ZERO, "timer {}", timer);
        }
        assert_eq!(settings.duration(TransactionTimer::F, true), Duration::from_secs(32));
        assert_eq!(settings.duration(TransactionTimer::H, true), Duration::from_secs(32));
    }

    #[test]
    fn test_timer_classes() {
        assert!(TransactionTimer::B.is_timeout());
        assert!(TransactionTimer::H.is_timeout());
        assert!(!TransactionTimer::K.is_timeout());
        assert!(TransactionTimer::G.is_retransmission());
        assert_eq!(TransactionTimer::G.to_string(), "G");
    }
}
