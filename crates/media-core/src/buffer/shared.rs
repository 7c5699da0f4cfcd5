//! Producer and consumer handles for a buffer shared between the network
//! receive path and the playout clock.
//!
//! Both handles lock the same `parking_lot::Mutex`, so `put` and `get` are
//! serialized and never observe a half-updated buffer.

use std::sync::Arc;

use parking_lot::Mutex;

use super::common::{FrameResult, JitterPacket, PutOutcome};
use super::config::JitterBufferConfig;
use super::jitter::JitterBuffer;
use super::stats::{JitterBufferState, JitterBufferStats};
use crate::error::Result;

/// Receive side: feeds packets
#[derive(Debug, Clone)]
pub struct JitterProducer {
    inner: Arc<Mutex<JitterBuffer>>,
}

/// Playout side: drives ticks and takes frames
#[derive(Debug, Clone)]
pub struct JitterConsumer {
    inner: Arc<Mutex<JitterBuffer>>,
}

impl JitterBuffer {
    /// Build a buffer and split it into producer and consumer handles
    pub fn shared(config: JitterBufferConfig) -> Result<(JitterProducer, JitterConsumer)> {
        let inner = Arc::new(Mutex::new(JitterBuffer::new(config)?));
        Ok((
            JitterProducer { inner: inner.clone() },
            JitterConsumer { inner },
        ))
    }
}

impl JitterProducer {
    pub fn put(&self, packet: JitterPacket) -> Result<PutOutcome> {
        self.inner.lock().put(packet)
    }
}

impl JitterConsumer {
    /// Advance one tick and take the frame due
    pub fn next_frame(&self) -> FrameResult {
        let mut jb = self.inner.lock();
        jb.tick();
        jb.get()
    }

    pub fn tick(&self) -> u64 {
        self.inner.lock().tick()
    }

    pub fn get(&self) -> FrameResult {
        self.inner.lock().get()
    }

    pub fn set_margin(&self, min_ms: u32, max_ms: u32) -> Result<()> {
        self.inner.lock().set_margin(min_ms, max_ms)
    }

    pub fn reset(&self) {
        self.inner.lock().reset()
    }

    pub fn state(&self) -> JitterBufferState {
        self.inner.lock().state()
    }

    pub fn stats(&self) -> JitterBufferStats {
        self.inner.lock().stats().clone()
    }
}
