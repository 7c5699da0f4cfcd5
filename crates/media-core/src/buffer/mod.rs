//! Jitter buffering for received media
//!
//! The buffer reorders packets by media timestamp, drops late and duplicate
//! ones, and plays one frame per tick behind an adaptive margin.

pub mod common;
pub use common::{Frame, FrameResult, JitterCalculator, JitterPacket, PutOutcome};

pub mod config;
pub use config::JitterBufferConfig;

pub mod jitter;
pub use jitter::JitterBuffer;

pub mod shared;
pub use shared::{JitterConsumer, JitterProducer};

pub mod stats;
pub use stats::{DriftStats, JitterBufferState, JitterBufferStats, Phase};
