//! Adaptive jitter buffer.
//!
//! Packets are stored by media timestamp. Playout runs on ticks: the owner
//! calls [`JitterBuffer::tick`] once per frame period and
//! [`JitterBuffer::get`] to take the frame due at the playout pointer.
//!
//! The margin is the buffered look-ahead past the pointer. It starts at the
//! configured initial value and, once the learning phase is over, follows
//! `ceil(jitter * multiplier)` within the configured bounds. The buffer grows
//! the margin by holding delivery back one tick and shrinks it by dropping
//! the oldest frame, at most once every `skip_interval` gets.

use std::collections::BTreeMap;

use bytes::BytesMut;
use tracing::{debug, trace, warn};

use super::common::{Frame, FrameResult, JitterCalculator, JitterPacket, PutOutcome};
use super::config::JitterBufferConfig;
use super::stats::{DriftStats, JitterBufferState, JitterBufferStats, Phase};
use crate::error::{JitterBufferError, Result};

#[derive(Debug)]
pub struct JitterBuffer {
    config: JitterBufferConfig,
    /// Buffered packets keyed by timestamp; ranges never overlap
    frames: BTreeMap<u64, JitterPacket>,
    phase: Phase,
    /// Timestamp of the next tick to play, set when prefetching ends
    playout: Option<u64>,
    current_tick: u64,
    /// Highest timestamp received in this stream
    highest: Option<u64>,
    jitter: JitterCalculator,
    /// Margin bounds and target, in frames
    min_margin: u32,
    max_margin: u32,
    target_margin: u32,
    learning_left: u32,
    gets_since_update: u32,
    gets_since_adjust: u32,
    stats: JitterBufferStats,
}

impl JitterBuffer {
    pub fn new(config: JitterBufferConfig) -> Result<Self> {
        config.validate()?;
        let min_margin = config.frames_for_ms(config.min_margin_ms);
        let max_margin = config.frames_for_ms(config.max_margin_ms);
        let target_margin = config
            .frames_for_ms(config.initial_margin_ms)
            .clamp(min_margin, max_margin);
        debug!(
            frame_span = config.frame_span,
            min_margin, target_margin, max_margin, "jitter buffer created"
        );
        Ok(Self {
            jitter: JitterCalculator::new(config.jitter_gain_shift),
            learning_left: config.update_interval,
            config,
            frames: BTreeMap::new(),
            phase: Phase::Prefetching,
            playout: None,
            current_tick: 0,
            highest: None,
            min_margin,
            max_margin,
            target_margin,
            gets_since_update: 0,
            gets_since_adjust: 0,
            stats: JitterBufferStats::default(),
        })
    }

    pub fn config(&self) -> &JitterBufferConfig {
        &self.config
    }

    /// Offer a packet.
    ///
    /// Zero spans and packets overlapping a buffered one without being
    /// identical to it are rejected with `BadArgument`.
    pub fn put(&mut self, packet: JitterPacket) -> Result<PutOutcome> {
        if packet.span == 0 {
            return Err(JitterBufferError::bad_argument("packet span is zero"));
        }

        if let Some(reference) = self.reference_timestamp() {
            if self.is_jump(reference, packet.timestamp) {
                warn!(
                    from = reference,
                    to = packet.timestamp,
                    "timestamp jump, restarting stream"
                );
                self.restart();
            }
        }

        if let Some(existing) = self.frames.get(&packet.timestamp) {
            if existing.span == packet.span {
                self.stats.received += 1;
                self.stats.duplicates += 1;
                trace!(timestamp = packet.timestamp, "duplicate packet");
                return Ok(PutOutcome::Duplicate);
            }
            return Err(JitterBufferError::bad_argument(format!(
                "packet at {} has span {} but {} is buffered",
                packet.timestamp, packet.span, existing.span
            )));
        }
        if let Some(other) = self.overlapping(&packet) {
            return Err(JitterBufferError::bad_argument(format!(
                "packet {}+{} overlaps buffered packet {}+{}",
                packet.timestamp, packet.span, other.0, other.1
            )));
        }

        self.stats.received += 1;
        let transit =
            self.current_tick as f64 - packet.timestamp as f64 / f64::from(self.config.frame_span);
        self.jitter.update(transit);
        self.stats.max_jitter = self.stats.max_jitter.max(self.jitter.jitter());

        match self.highest {
            Some(highest) if packet.timestamp < highest => self.stats.out_of_order += 1,
            _ => self.highest = Some(packet.timestamp),
        }

        // A packet straddling the pointer is late as well: its head is
        // already played out
        if let Some(pointer) = self.playout {
            if packet.timestamp < pointer {
                self.stats.late += 1;
                debug!(timestamp = packet.timestamp, pointer, "late packet dropped");
                return Ok(PutOutcome::Late);
            }
        }

        if self.frames.len() >= self.config.max_frames || self.beyond_look_ahead(&packet) {
            self.stats.too_soon += 1;
            debug!(timestamp = packet.timestamp, level = self.frames.len(), "packet too far ahead");
            return Ok(PutOutcome::TooSoon);
        }

        trace!(timestamp = packet.timestamp, span = packet.span, "packet stored");
        self.frames.insert(packet.timestamp, packet);
        self.stats.stored += 1;
        self.stats.max_level = self.stats.max_level.max(self.frames.len());
        Ok(PutOutcome::Stored)
    }

    /// Advance the tick counter; returns the new tick
    pub fn tick(&mut self) -> u64 {
        self.current_tick += 1;
        self.current_tick
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    /// Take the frame due at the playout pointer
    pub fn get(&mut self) -> FrameResult {
        self.gets_since_adjust = self.gets_since_adjust.saturating_add(1);

        let mut pointer = match self.playout {
            Some(pointer) => pointer,
            None => match self.start_playout() {
                Some(pointer) => pointer,
                None => {
                    self.stats.held_back += 1;
                    return FrameResult::Missing;
                }
            },
        };

        match self.phase {
            Phase::Learning => {
                self.learning_left = self.learning_left.saturating_sub(1);
                if self.learning_left == 0 {
                    debug!(target_margin = self.target_margin, "learning finished");
                    self.phase = Phase::Running;
                    self.gets_since_update = 0;
                }
            }
            Phase::Running => {
                self.gets_since_update += 1;
                if self.gets_since_update >= self.config.update_interval {
                    self.gets_since_update = 0;
                    self.update_target();
                }

                let level = self.look_ahead(pointer);
                if self.gets_since_adjust >= self.config.skip_interval {
                    if level < self.target_margin {
                        self.gets_since_adjust = 0;
                        self.stats.held_back += 1;
                        trace!(level, target = self.target_margin, "holding back");
                        return FrameResult::Missing;
                    }
                    if level > self.target_margin + 1 {
                        self.gets_since_adjust = 0;
                        pointer = self.skip(pointer);
                    }
                }
            }
            Phase::Prefetching => {}
        }

        self.emit(pointer)
    }

    /// Change the margin bounds; the target is clamped into them
    pub fn set_margin(&mut self, min_ms: u32, max_ms: u32) -> Result<()> {
        if min_ms > max_ms {
            return Err(JitterBufferError::bad_argument(format!(
                "min margin {min_ms}ms exceeds max margin {max_ms}ms"
            )));
        }
        self.config.min_margin_ms = min_ms;
        self.config.max_margin_ms = max_ms;
        self.min_margin = self.config.frames_for_ms(min_ms);
        self.max_margin = self.config.frames_for_ms(max_ms);
        self.target_margin = self.target_margin.clamp(self.min_margin, self.max_margin);
        debug!(
            min_margin = self.min_margin,
            max_margin = self.max_margin,
            target_margin = self.target_margin,
            "margin bounds changed"
        );
        Ok(())
    }

    /// Drop everything and prefetch again at the initial margin
    pub fn reset(&mut self) {
        self.restart();
        self.jitter.reset();
        self.target_margin = self
            .config
            .frames_for_ms(self.config.initial_margin_ms)
            .clamp(self.min_margin, self.max_margin);
    }

    pub fn state(&self) -> JitterBufferState {
        JitterBufferState {
            phase: self.phase,
            current_margin: self.current_margin(),
            target_margin: self.target_margin,
            frame_count: self.frames.len(),
            playout_pointer: self.playout,
            drift: DriftStats {
                drift: self.jitter.drift(),
                max_drift: self.jitter.max_drift(),
                jitter: self.jitter.jitter(),
            },
        }
    }

    pub fn stats(&self) -> &JitterBufferStats {
        &self.stats
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn playout_pointer(&self) -> Option<u64> {
        self.playout
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn current_margin(&self) -> u32 {
        match (self.playout, self.frames.keys().next()) {
            (Some(pointer), _) | (None, Some(&pointer)) => self.look_ahead(pointer),
            (None, None) => 0,
        }
    }

    /// Frames buffered from `from` to the end of the last packet
    fn look_ahead(&self, from: u64) -> u32 {
        let end = match self.frames.values().next_back() {
            Some(last) => last.end(),
            None => return 0,
        };
        let units = end.saturating_sub(from);
        let frames = units.div_ceil(u64::from(self.config.frame_span));
        u32::try_from(frames).unwrap_or(u32::MAX)
    }

    fn reference_timestamp(&self) -> Option<u64> {
        self.playout.or_else(|| self.frames.keys().next().copied())
    }

    fn is_jump(&self, reference: u64, timestamp: u64) -> bool {
        let distance = reference.abs_diff(timestamp) / u64::from(self.config.frame_span);
        distance > u64::from(self.config.reset_threshold)
    }

    fn beyond_look_ahead(&self, packet: &JitterPacket) -> bool {
        let Some(reference) = self.reference_timestamp() else {
            return false;
        };
        let window = self.config.max_frames as u64 * u64::from(self.config.frame_span);
        packet.timestamp >= reference.saturating_add(window)
    }

    /// Timestamp and span of a buffered packet sharing part of `packet`'s range
    fn overlapping(&self, packet: &JitterPacket) -> Option<(u64, u32)> {
        let before = self
            .frames
            .range(..packet.timestamp)
            .next_back()
            .filter(|(_, p)| p.end() > packet.timestamp);
        let after = self
            .frames
            .range(packet.timestamp..)
            .next()
            .filter(|(ts, _)| **ts < packet.end());
        before
            .or(after)
            .map(|(ts, p)| (*ts, p.span))
    }

    /// Leave prefetching once the look-ahead reaches the target margin
    fn start_playout(&mut self) -> Option<u64> {
        let first = *self.frames.keys().next()?;
        if self.look_ahead(first) < self.target_margin {
            return None;
        }
        debug!(pointer = first, margin = self.look_ahead(first), "playout started");
        self.playout = Some(first);
        self.phase = Phase::Learning;
        self.learning_left = self.config.update_interval;
        Some(first)
    }

    fn update_target(&mut self) {
        let wanted = (self.jitter.jitter() * self.config.jitter_multiplier).ceil();
        let wanted = if wanted >= f64::from(u32::MAX) { u32::MAX } else { wanted as u32 };
        let target = wanted.clamp(self.min_margin, self.max_margin);
        if target != self.target_margin {
            debug!(
                from = self.target_margin,
                to = target,
                jitter = self.jitter.jitter(),
                "target margin changed"
            );
            self.target_margin = target;
        }
    }

    /// Drop the tick at `pointer`; returns the new pointer
    fn skip(&mut self, pointer: u64) -> u64 {
        let next = pointer + u64::from(self.config.frame_span);
        let dropped = self.take_before(next);
        self.stats.skipped += 1;
        trace!(pointer, dropped = dropped.len(), target = self.target_margin, "frame skipped");
        self.playout = Some(next);
        next
    }

    fn take_before(&mut self, end: u64) -> Vec<JitterPacket> {
        let rest = self.frames.split_off(&end);
        let taken = std::mem::replace(&mut self.frames, rest);
        taken.into_values().collect()
    }

    fn emit(&mut self, pointer: u64) -> FrameResult {
        let tick_end = pointer + u64::from(self.config.frame_span);
        let parts = self.take_before(tick_end);

        let Some(first) = parts.first() else {
            self.stats.missing += 1;
            self.playout = Some(tick_end);
            trace!(pointer, "frame missing");
            return FrameResult::Missing;
        };

        let start = first.timestamp;
        let mut run_end = start;
        let mut data = BytesMut::new();
        let mut used = 0;
        for part in &parts {
            if part.timestamp != run_end {
                break;
            }
            data.extend_from_slice(&part.data);
            run_end = part.end();
            used += 1;
        }
        if used < parts.len() {
            trace!(pointer, discarded = parts.len() - used, "fragments after a gap discarded");
        }

        let frame = Frame {
            timestamp: start,
            span: u32::try_from(run_end - start).unwrap_or(u32::MAX),
            offset: u32::try_from(start.saturating_sub(pointer)).unwrap_or(u32::MAX),
            data: data.freeze(),
        };

        if start == pointer && run_end >= tick_end {
            self.stats.delivered += 1;
            self.playout = Some(run_end);
            FrameResult::Ok(frame)
        } else {
            self.stats.incomplete += 1;
            self.playout = Some(run_end.max(tick_end));
            trace!(pointer, offset = frame.offset, span = frame.span, "incomplete frame");
            FrameResult::Incomplete(frame)
        }
    }

    /// Empty the buffer and prefetch again, keeping the learned margin
    fn restart(&mut self) {
        self.frames.clear();
        self.playout = None;
        self.highest = None;
        self.phase = Phase::Prefetching;
        self.gets_since_update = 0;
        self.gets_since_adjust = 0;
        self.jitter.rebase();
        self.stats.resets += 1;
    }
}
