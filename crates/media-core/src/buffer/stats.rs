use serde::Serialize;

/// Playout phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// Collecting the initial margin; nothing is played yet
    Prefetching,
    /// Playing at the initial margin while the jitter estimate settles
    Learning,
    /// Playing with an adaptive margin
    Running,
}

/// Counters kept across the buffer's lifetime, including resets
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JitterBufferStats {
    /// Packets passed to `put` that were well formed
    pub received: u64,
    pub stored: u64,
    /// Packets dropped because their playout time had passed
    pub late: u64,
    pub duplicates: u64,
    /// Packets older than one already received
    pub out_of_order: u64,
    /// Packets beyond the accepted look-ahead
    pub too_soon: u64,
    /// Complete frames returned
    pub delivered: u64,
    /// Partial frames returned
    pub incomplete: u64,
    /// Ticks with nothing to play at the pointer
    pub missing: u64,
    /// Gets answered with Missing to build up the margin
    pub held_back: u64,
    /// Frames dropped to shrink the margin
    pub skipped: u64,
    /// Stream restarts, explicit or caused by a timestamp jump
    pub resets: u64,
    /// Largest number of packets buffered at once
    pub max_level: usize,
    /// Largest jitter estimate seen, in ticks
    pub max_jitter: f64,
}

/// Transit statistics, in ticks
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DriftStats {
    /// Transit of the latest packet relative to the first of the stream
    pub drift: f64,
    pub max_drift: f64,
    pub jitter: f64,
}

/// Snapshot of the buffer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JitterBufferState {
    pub phase: Phase,
    /// Buffered look-ahead, in frames
    pub current_margin: u32,
    /// Look-ahead the buffer steers towards, in frames
    pub target_margin: u32,
    pub frame_count: usize,
    pub playout_pointer: Option<u64>,
    pub drift: DriftStats,
}
