use bytes::Bytes;

/// A media packet handed to the jitter buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JitterPacket {
    /// Media timestamp of the first sample
    pub timestamp: u64,
    /// Timestamp units the packet covers
    pub span: u32,
    /// Payload
    pub data: Bytes,
}

impl JitterPacket {
    pub fn new(timestamp: u64, span: u32, data: impl Into<Bytes>) -> Self {
        Self {
            timestamp,
            span,
            data: data.into(),
        }
    }

    /// First timestamp after the packet
    pub fn end(&self) -> u64 {
        self.timestamp + u64::from(self.span)
    }
}

/// Media returned for one playout tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Media timestamp of the first byte of `data`
    pub timestamp: u64,
    /// Timestamp units covered by `data`
    pub span: u32,
    /// Distance from the start of the tick to the start of `data`
    pub offset: u32,
    pub data: Bytes,
}

/// Result of a playout request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameResult {
    /// The whole tick is covered
    Ok(Frame),
    /// Only part of the tick arrived; the rest should be concealed
    Incomplete(Frame),
    /// Nothing to play, conceal the whole tick
    Missing,
}

impl FrameResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, FrameResult::Ok(_))
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, FrameResult::Missing)
    }

    pub fn frame(&self) -> Option<&Frame> {
        match self {
            FrameResult::Ok(frame) | FrameResult::Incomplete(frame) => Some(frame),
            FrameResult::Missing => None,
        }
    }
}

/// What happened to a packet passed to `put`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Stored,
    /// Its playout time has passed
    Late,
    /// The same packet is already buffered
    Duplicate,
    /// Beyond the look-ahead the buffer accepts
    TooSoon,
}

/// Interarrival jitter estimator (RFC 3550 section 6.4.1), in ticks.
///
/// Transit is arrival time minus media time. Each new transit moves the
/// estimate by `(|D| - J) / 2^gain_shift`, D being the change in transit.
#[derive(Debug, Clone)]
pub struct JitterCalculator {
    gain_shift: u32,
    jitter: f64,
    max_jitter: f64,
    last_transit: Option<f64>,
    base_transit: Option<f64>,
    drift: f64,
    max_drift: f64,
}

impl JitterCalculator {
    pub fn new(gain_shift: u32) -> Self {
        Self {
            gain_shift,
            jitter: 0.0,
            max_jitter: 0.0,
            last_transit: None,
            base_transit: None,
            drift: 0.0,
            max_drift: 0.0,
        }
    }

    pub fn update(&mut self, transit: f64) {
        let base = *self.base_transit.get_or_insert(transit);
        if let Some(last) = self.last_transit {
            let d = (transit - last).abs();
            self.jitter += (d - self.jitter) / f64::from(1u32 << self.gain_shift);
            self.max_jitter = self.max_jitter.max(self.jitter);
        }
        self.last_transit = Some(transit);

        self.drift = transit - base;
        self.max_drift = self.max_drift.max(self.drift.abs());
    }

    /// Forget the transit baseline; the estimate itself is kept
    pub fn rebase(&mut self) {
        self.last_transit = None;
        self.base_transit = None;
        self.drift = 0.0;
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.gain_shift);
    }

    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    pub fn max_jitter(&self) -> f64 {
        self.max_jitter
    }

    /// Transit of the last packet relative to the first, in ticks
    pub fn drift(&self) -> f64 {
        self.drift
    }

    pub fn max_drift(&self) -> f64 {
        self.max_drift
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_transit_has_no_jitter() {
        let mut calc = JitterCalculator::new(4);
        for _ in 0..20 {
            calc.update(3.0);
        }
        assert_eq!(calc.jitter(), 0.0);
        assert_eq!(calc.drift(), 0.0);
    }

    #[test]
    fn test_jitter_moves_by_a_sixteenth() {
        let mut calc = JitterCalculator::new(4);
        calc.update(0.0);
        calc.update(16.0);
        assert!((calc.jitter() - 1.0).abs() < 1e-9);
        assert_eq!(calc.drift(), 16.0);
        assert_eq!(calc.max_drift(), 16.0);
    }

    #[test]
    fn test_rebase_keeps_estimate() {
        let mut calc = JitterCalculator::new(4);
        calc.update(0.0);
        calc.update(16.0);
        calc.rebase();
        calc.update(1000.0);
        assert!((calc.jitter() - 1.0).abs() < 1e-9);
        assert_eq!(calc.drift(), 0.0);
    }

    #[test]
    fn test_frame_result_accessors() {
        let frame = Frame {
            timestamp: 0,
            span: 1,
            offset: 0,
            data: Bytes::from_static(b"x"),
        };
        assert!(FrameResult::Ok(frame.clone()).is_ok());
        assert_eq!(FrameResult::Incomplete(frame.clone()).frame(), Some(&frame));
        assert!(FrameResult::Missing.is_missing());
        assert!(FrameResult::Missing.frame().is_none());
    }
}
