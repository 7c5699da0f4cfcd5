//! Property tests for the timer heap

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use voxcore_dialog_core::transaction::timer::{ManualClock, TimerHeap};

fn heap() -> (TimerHeap<(u64, usize)>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    (TimerHeap::with_clock(clock.clone()), clock)
}

proptest! {
    #[test]
    fn fires_in_expiry_order(delays in prop::collection::vec(0u64..10_000, 1..200)) {
        let (heap, clock) = heap();
        for (index, delay) in delays.iter().enumerate() {
            heap.schedule(Duration::from_millis(*delay), (*delay, index)).unwrap();
        }

        clock.advance(Duration::from_millis(10_000));
        let mut fired = Vec::new();
        let count = heap.poll(usize::MAX, |_, payload| fired.push(payload));

        prop_assert_eq!(count, delays.len());
        prop_assert!(heap.is_empty());
        // Nondecreasing expiry; equal expiries keep scheduling order
        for pair in fired.windows(2) {
            prop_assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn cancelled_entries_never_fire(
        delays in prop::collection::vec(1u64..5_000, 1..100),
        cancel_mask in prop::collection::vec(any::<bool>(), 100),
    ) {
        let (heap, clock) = heap();
        let ids: Vec<_> = delays
            .iter()
            .enumerate()
            .map(|(index, delay)| heap.schedule(Duration::from_millis(*delay), (*delay, index)).unwrap())
            .collect();

        let mut cancelled = HashSet::new();
        for (index, id) in ids.iter().enumerate() {
            if cancel_mask[index] {
                prop_assert!(heap.cancel(*id));
                cancelled.insert(index);
            }
        }
        prop_assert_eq!(heap.len(), delays.len() - cancelled.len());

        clock.advance(Duration::from_millis(5_000));
        let mut fired = HashSet::new();
        heap.poll(usize::MAX, |_, (_, index)| {
            fired.insert(index);
        });

        prop_assert!(fired.is_disjoint(&cancelled));
        prop_assert_eq!(fired.len() + cancelled.len(), delays.len());
        for id in ids {
            prop_assert!(!heap.cancel(id));
        }
    }

    #[test]
    fn nothing_fires_early(delays in prop::collection::vec(1u64..1_000, 1..50), elapsed in 0u64..1_000) {
        let (heap, clock) = heap();
        for (index, delay) in delays.iter().enumerate() {
            heap.schedule(Duration::from_millis(*delay), (*delay, index)).unwrap();
        }

        clock.advance(Duration::from_millis(elapsed));
        let mut fired = Vec::new();
        heap.poll(usize::MAX, |_, (delay, _)| fired.push(delay));

        prop_assert!(fired.iter().all(|delay| *delay <= elapsed));
        let due = delays.iter().filter(|delay| **delay <= elapsed).count();
        prop_assert_eq!(fired.len(), due);
    }
}

#[test]
fn test_reused_slot_rejects_stale_id() {
    let (heap, clock) = heap();
    let first = heap.schedule(Duration::from_millis(10), (10, 0)).unwrap();
    clock.advance(Duration::from_millis(10));
    assert_eq!(heap.poll(16, |_, _| {}), 1);

    let second = heap.schedule(Duration::from_millis(10), (10, 1)).unwrap();
    assert_ne!(first, second);
    assert!(!heap.cancel(first));
    assert!(heap.is_pending(second));
}

#[test]
fn test_entries_scheduled_during_poll_wait_for_next_poll() {
    let (heap, clock) = heap();
    let heap = Arc::new(heap);
    heap.schedule(Duration::ZERO, (0, 0)).unwrap();

    let inner = heap.clone();
    let fired = heap.poll(16, move |_, (_, index)| {
        inner.schedule(Duration::ZERO, (0, index + 1)).unwrap();
    });
    assert_eq!(fired, 1);
    assert_eq!(heap.len(), 1);

    clock.advance(Duration::from_millis(1));
    assert_eq!(heap.poll(16, |_, _| {}), 1);
}
