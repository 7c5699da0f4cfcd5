//! Property tests for jitter buffer ordering and loss handling

use bytes::Bytes;
use proptest::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use voxcore_media_core::Phase;
use voxcore_media_core::prelude::*;

/// Unit-tick buffer that starts playing as soon as anything is buffered and
/// never leaves the learning phase
fn learning_buffer(max_frames: usize) -> JitterBuffer {
    let config = JitterBufferConfig::unit_frames()
        .with_margins(0, 0, 400)
        .with_max_frames(max_frames)
        .with_intervals(10_000, 10);
    JitterBuffer::new(config).unwrap()
}

fn packet(ts: u64) -> JitterPacket {
    JitterPacket::new(ts, 1, Bytes::copy_from_slice(&ts.to_be_bytes()))
}

#[derive(Debug, Clone)]
enum Op {
    Put(u64, u32),
    Play,
}

/// Packets of one to three units on a two-unit frame grid, so most of them
/// start or end in the middle of a frame
fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u64..200, 1u32..4).prop_map(|(ts, span)| Op::Put(ts, span)),
        Just(Op::Play),
    ]
}

proptest! {
    #[test]
    fn any_arrival_order_plays_in_order(order in Just((0u64..40).collect::<Vec<_>>()).prop_shuffle()) {
        let mut jb = learning_buffer(64);
        for ts in &order {
            prop_assert_eq!(jb.put(packet(*ts)).unwrap(), PutOutcome::Stored);
        }

        for expected in 0..40u64 {
            jb.tick();
            match jb.get() {
                FrameResult::Ok(frame) => {
                    prop_assert_eq!(frame.timestamp, expected);
                    prop_assert_eq!(frame.data, Bytes::copy_from_slice(&expected.to_be_bytes()));
                }
                other => prop_assert!(false, "tick {} gave {:?}", expected, other),
            }
        }
        prop_assert!(jb.is_empty());
    }

    #[test]
    fn lost_packets_become_missing(kept in prop::collection::vec(any::<bool>(), 1..60)) {
        prop_assume!(kept.iter().any(|k| *k));
        let mut jb = learning_buffer(64);
        for (ts, _) in kept.iter().enumerate().filter(|(_, k)| **k) {
            jb.put(packet(ts as u64)).unwrap();
        }

        let first = kept.iter().position(|k| *k).unwrap();
        let last = kept.iter().rposition(|k| *k).unwrap();
        for ts in first..=last {
            jb.tick();
            let result = jb.get();
            prop_assert_eq!(result.is_ok(), kept[ts], "tick for timestamp {}", ts);
            prop_assert_eq!(jb.playout_pointer(), Some(ts as u64 + 1));
        }
        let missing = kept[first..=last].iter().filter(|k| !**k).count() as u64;
        prop_assert_eq!(jb.stats().missing, missing);
    }

    #[test]
    fn delivery_is_strictly_increasing(ops in prop::collection::vec(op(), 1..300)) {
        let config = JitterBufferConfig::default()
            .with_frame_span(2, 20)
            .with_margins(0, 40, 200)
            .with_max_frames(32)
            .with_intervals(8, 2);
        let mut jb = JitterBuffer::new(config).unwrap();
        let mut last_end: Option<u64> = None;

        for op in ops {
            match op {
                Op::Put(ts, span) => {
                    // Overlapping a buffered packet is refused
                    let data = Bytes::from(vec![0u8; span as usize]);
                    if let Err(err) = jb.put(JitterPacket::new(ts, span, data)) {
                        prop_assert!(matches!(err, JitterBufferError::BadArgument(_)));
                    }
                    prop_assert!(jb.frame_count() <= 32);
                }
                Op::Play => {
                    jb.tick();
                    let pointer = jb.playout_pointer();
                    if let Some(frame) = jb.get().frame() {
                        if let Some(end) = last_end {
                            prop_assert!(frame.timestamp >= end, "frame {} before {}", frame.timestamp, end);
                        }
                        if let Some(pointer) = pointer {
                            prop_assert!(frame.timestamp >= pointer);
                        }
                        last_end = Some(frame.timestamp + u64::from(frame.span));
                    }
                }
            }
        }

        let stats = jb.stats();
        prop_assert_eq!(
            stats.received,
            stats.stored + stats.late + stats.duplicates + stats.too_soon
        );
    }
}

#[test]
fn test_jittery_network_accounting() {
    let mut rng = SmallRng::seed_from_u64(7);
    let mut arrivals: Vec<(u64, u64)> = (0..500u64)
        .map(|ts| (ts + rng.gen_range(0..4), ts))
        .collect();
    arrivals.sort();

    let mut jb = JitterBuffer::new(JitterBufferConfig::unit_frames()).unwrap();
    let mut pending = arrivals.into_iter().peekable();
    let mut last_delivered = None;

    for tick in 0..520u64 {
        while let Some((_, ts)) = pending.next_if(|(at, _)| *at == tick) {
            jb.put(packet(ts)).unwrap();
        }
        jb.tick();
        if let FrameResult::Ok(frame) = jb.get() {
            assert_eq!(frame.data, Bytes::copy_from_slice(&frame.timestamp.to_be_bytes()));
            assert!(last_delivered.map_or(true, |prev| frame.timestamp > prev));
            last_delivered = Some(frame.timestamp);
        }
    }

    let stats = jb.stats();
    assert_eq!(stats.received, 500);
    assert_eq!(stats.duplicates, 0);
    assert_eq!(stats.received, stats.stored + stats.late + stats.too_soon);
    assert!(stats.delivered > 0);
    assert!(stats.max_jitter > 0.0);
    assert_eq!(jb.state().phase, Phase::Running);
}

#[test]
fn test_config_from_toml() {
    let config: JitterBufferConfig = voxcore_infra_common::config::from_toml_str(
        "frame_span = 80\nframe_duration_ms = 10\nmax_margin_ms = 120",
    )
    .unwrap();
    assert_eq!(config.frame_span, 80);
    assert_eq!(config.frames_for_ms(config.max_margin_ms), 12);
    assert_eq!(config.min_margin_ms, JitterBufferConfig::default().min_margin_ms);
    assert!(JitterBuffer::new(config).is_ok());
}
