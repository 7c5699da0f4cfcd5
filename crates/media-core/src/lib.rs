//! # voxcore-media-core
//!
//! Media handling for voxcore. Currently this is the adaptive jitter buffer
//! that sits between the RTP receive path and the audio playout clock.
//!
//! ```rust
//! use bytes::Bytes;
//! use voxcore_media_core::prelude::*;
//!
//! let config = JitterBufferConfig::unit_frames().with_margins(0, 40, 400);
//! let mut jb = JitterBuffer::new(config).unwrap();
//! for ts in [1, 0, 2] {
//!     jb.put(JitterPacket::new(ts, 1, Bytes::from_static(b"pcm"))).unwrap();
//! }
//! jb.tick();
//! assert!(jb.get().is_ok());
//! ```

pub mod buffer;
pub mod error;

pub use buffer::{
    DriftStats, Frame, FrameResult, JitterBuffer, JitterBufferConfig, JitterBufferState,
    JitterBufferStats, JitterConsumer, JitterPacket, JitterProducer, Phase, PutOutcome,
};
pub use error::{JitterBufferError, Result};

pub mod prelude {
    pub use crate::buffer::{
        Frame, FrameResult, JitterBuffer, JitterBufferConfig, JitterPacket, PutOutcome,
    };
    pub use crate::error::{JitterBufferError, Result};
}
