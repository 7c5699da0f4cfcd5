//! Jitter buffer configuration.
//!
//! ```rust
//! use voxcore_infra_common::config::from_toml_str;
//! use voxcore_media_core::buffer::JitterBufferConfig;
//!
//! let config: JitterBufferConfig = from_toml_str("min_margin_ms = 40\nskip_interval = 25").unwrap();
//! assert_eq!(config.min_margin_ms, 40);
//! assert_eq!(config.frame_span, 160);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{JitterBufferError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JitterBufferConfig {
    /// Timestamp units covered by one playout tick (160 for 20ms at 8kHz)
    pub frame_span: u32,

    /// Wall-clock length of one tick, used to turn margins into frames
    pub frame_duration_ms: u32,

    pub min_margin_ms: u32,
    pub max_margin_ms: u32,

    /// Look-ahead collected before the first frame is played
    pub initial_margin_ms: u32,

    /// Furthest look-ahead, in frames, the buffer accepts
    pub max_frames: usize,

    /// Least number of gets between two margin adjustments (skip or hold back)
    pub skip_interval: u32,

    /// Gets between target margin updates; also the length of the learning phase
    pub update_interval: u32,

    /// Target margin as a multiple of the jitter estimate
    pub jitter_multiplier: f64,

    /// The jitter average moves by 1/2^shift of each new sample (4 in RFC 3550)
    pub jitter_gain_shift: u32,

    /// Timestamp jump, in frames, treated as a new stream
    pub reset_threshold: u32,
}

impl Default for JitterBufferConfig {
    fn default() -> Self {
        JitterBufferConfig {
            frame_span: 160,
            frame_duration_ms: 20,
            min_margin_ms: 20,
            max_margin_ms: 400,
            initial_margin_ms: 60,
            max_frames: 50,
            skip_interval: 10,
            update_interval: 50,
            jitter_multiplier: 2.0,
            jitter_gain_shift: 4,
            reset_threshold: 250,
        }
    }
}

impl JitterBufferConfig {
    /// Load from a TOML file; missing keys keep their defaults
    pub fn load(path: impl AsRef<Path>) -> voxcore_infra_common::Result<Self> {
        voxcore_infra_common::config::load_toml(path)
    }

    /// Configuration counting time in plain ticks: one timestamp unit per
    /// tick, 20ms per tick
    pub fn unit_frames() -> Self {
        JitterBufferConfig {
            frame_span: 1,
            ..Self::default()
        }
    }

    pub fn with_frame_span(mut self, frame_span: u32, frame_duration_ms: u32) -> Self {
        self.frame_span = frame_span;
        self.frame_duration_ms = frame_duration_ms;
        self
    }

    pub fn with_margins(mut self, min_ms: u32, initial_ms: u32, max_ms: u32) -> Self {
        self.min_margin_ms = min_ms;
        self.initial_margin_ms = initial_ms;
        self.max_margin_ms = max_ms;
        self
    }

    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = max_frames;
        self
    }

    pub fn with_intervals(mut self, update_interval: u32, skip_interval: u32) -> Self {
        self.update_interval = update_interval;
        self.skip_interval = skip_interval;
        self
    }

    pub fn with_reset_threshold(mut self, frames: u32) -> Self {
        self.reset_threshold = frames;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_span == 0 || self.frame_duration_ms == 0 {
            return Err(JitterBufferError::bad_argument("frame span and duration must be positive"));
        }
        if self.min_margin_ms > self.max_margin_ms {
            return Err(JitterBufferError::bad_argument(format!(
                "min margin {}ms exceeds max margin {}ms",
                self.min_margin_ms, self.max_margin_ms
            )));
        }
        if self.max_frames == 0 || self.update_interval == 0 || self.skip_interval == 0 {
            return Err(JitterBufferError::bad_argument(
                "max_frames, update_interval and skip_interval must be positive",
            ));
        }
        if !(self.jitter_multiplier.is_finite() && self.jitter_multiplier >= 0.0) {
            return Err(JitterBufferError::bad_argument("jitter multiplier must be a finite non-negative number"));
        }
        if self.jitter_gain_shift > 16 {
            return Err(JitterBufferError::bad_argument("jitter gain shift above 16"));
        }
        Ok(())
    }

    /// Whole frames needed to cover `ms`
    pub fn frames_for_ms(&self, ms: u32) -> u32 {
        ms.div_ceil(self.frame_duration_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(JitterBufferConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_margins() {
        let config = JitterBufferConfig::default().with_margins(100, 60, 40);
        assert!(matches!(config.validate(), Err(JitterBufferError::BadArgument(_))));
    }

    #[test]
    fn test_frames_for_ms_rounds_up() {
        let config = JitterBufferConfig::default();
        assert_eq!(config.frames_for_ms(0), 0);
        assert_eq!(config.frames_for_ms(20), 1);
        assert_eq!(config.frames_for_ms(21), 2);
    }
}
