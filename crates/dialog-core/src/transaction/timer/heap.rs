//! # Timer heap
//!
//! A binary min-heap of pending timeouts keyed by `(expiry, insertion order)`,
//! so entries with equal expiry fire first-in first-out.
//!
//! Every entry owns a slot in a side table. The slot records where the entry
//! currently sits in the heap (which makes `cancel` O(log n)) and a
//! generation counter that is bumped each time the slot is released. A
//! [`TimerId`] carries the generation it was issued with, so a cancel that
//! races with a fire, or that arrives after the slot was reused, simply finds
//! a mismatch and returns `false`. Released slots go on a free list.
//!
//! ```text
//!  slots: [ {gen 3, pos 0} {gen 1, free} {gen 0, pos 1} ]      free: [1]
//!                 │                             │
//!  heap:  [ (t=10, seq 7, slot 0) , (t=25, seq 9, slot 2) ]
//! ```
//!
//! `poll` pops one due entry per lock acquisition and runs the handler with
//! the lock released, so handlers may schedule or cancel freely. Entries
//! scheduled while a poll is running wait for the next poll, even with a zero
//! delay.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::trace;

use super::clock::{Clock, SystemClock};
use crate::errors::{Error, Result};

const INITIAL_CAPACITY: usize = 16;

/// Handle to a scheduled entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId {
    slot: u32,
    generation: u32,
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.slot, self.generation)
    }
}

/// Boxed one-shot callback; it receives its own id
pub type TimerCallback = Box<dyn FnOnce(TimerId) + Send + 'static>;

struct Entry<T> {
    expiry: Instant,
    seq: u64,
    slot: u32,
    payload: T,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    generation: u32,
    position: Option<usize>,
}

struct Inner<T> {
    heap: Vec<Entry<T>>,
    slots: Vec<Slot>,
    free: Vec<u32>,
    next_seq: u64,
}

impl<T> Inner<T> {
    fn new() -> Self {
        Inner {
            heap: Vec::with_capacity(INITIAL_CAPACITY),
            slots: Vec::with_capacity(INITIAL_CAPACITY),
            free: Vec::new(),
            next_seq: 0,
        }
    }

    fn before(&self, a: usize, b: usize) -> bool {
        let (x, y) = (&self.heap[a], &self.heap[b]);
        (x.expiry, x.seq) < (y.expiry, y.seq)
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        let slot_a = self.heap[a].slot as usize;
        let slot_b = self.heap[b].slot as usize;
        self.slots[slot_a].position = Some(a);
        self.slots[slot_b].position = Some(b);
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if !self.before(pos, parent) {
                break;
            }
            self.swap(pos, parent);
            pos = parent;
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * pos + 1;
            let right = left + 1;
            let mut smallest = pos;
            if left < len && self.before(left, smallest) {
                smallest = left;
            }
            if right < len && self.before(right, smallest) {
                smallest = right;
            }
            if smallest == pos {
                break;
            }
            self.swap(pos, smallest);
            pos = smallest;
        }
    }

    // Doubles the backing store explicitly so that allocation failure is
    // reported instead of aborting.
    fn reserve_one<V>(vec: &mut Vec<V>) -> Result<()> {
        if vec.len() == vec.capacity() {
            let extra = vec.capacity().max(INITIAL_CAPACITY);
            vec.try_reserve(extra)
                .map_err(|_| Error::CapacityExceeded("timer heap allocation failed"))?;
        }
        Ok(())
    }

    fn allocate_slot(&mut self) -> Result<u32> {
        if let Some(slot) = self.free.pop() {
            return Ok(slot);
        }
        let index = u32::try_from(self.slots.len())
            .map_err(|_| Error::CapacityExceeded("timer heap slot space exhausted"))?;
        Self::reserve_one(&mut self.slots)?;
        self.slots.push(Slot {
            generation: 0,
            position: None,
        });
        Ok(index)
    }

    fn release_slot(&mut self, slot: u32) {
        let entry = &mut self.slots[slot as usize];
        entry.generation = entry.generation.wrapping_add(1);
        entry.position = None;
        self.free.push(slot);
    }

    fn insert(&mut self, expiry: Instant, payload: T) -> Result<TimerId> {
        Self::reserve_one(&mut self.heap)?;
        let slot = self.allocate_slot()?;
        let seq = self.next_seq;
        self.next_seq += 1;

        let pos = self.heap.len();
        self.heap.push(Entry {
            expiry,
            seq,
            slot,
            payload,
        });
        self.slots[slot as usize].position = Some(pos);
        self.sift_up(pos);

        Ok(TimerId {
            slot,
            generation: self.slots[slot as usize].generation,
        })
    }

    fn position_of(&self, id: TimerId) -> Option<usize> {
        self.slots
            .get(id.slot as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.position)
    }

    /// Removes the entry at `pos` and releases its slot
    fn remove_at(&mut self, pos: usize) -> (TimerId, Entry<T>) {
        let entry = self.heap.swap_remove(pos);
        if pos < self.heap.len() {
            let moved = self.heap[pos].slot as usize;
            self.slots[moved].position = Some(pos);
            if pos > 0 && self.before(pos, (pos - 1) / 2) {
                self.sift_up(pos);
            } else {
                self.sift_down(pos);
            }
        }
        let id = TimerId {
            slot: entry.slot,
            generation: self.slots[entry.slot as usize].generation,
        };
        self.release_slot(entry.slot);
        (id, entry)
    }
}

/// Min-heap of scheduled entries carrying a payload of type `T`.
///
/// The transaction layer stores `(transaction key, timer name)` payloads and
/// dispatches them itself; [`TimerHeap<TimerCallback>`] offers the plain
/// callback form.
pub struct TimerHeap<T> {
    inner: Mutex<Inner<T>>,
    clock: Arc<dyn Clock>,
    limit: Option<usize>,
}

impl<T> TimerHeap<T> {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        TimerHeap {
            inner: Mutex::new(Inner::new()),
            clock,
            limit: None,
        }
    }

    /// Bound the number of pending entries; scheduling beyond it fails with
    /// [`Error::CapacityExceeded`]
    pub fn with_capacity_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Schedule `payload` to fire `delay` from now
    pub fn schedule(&self, delay: Duration, payload: T) -> Result<TimerId> {
        let expiry = self.clock.now() + delay;
        self.schedule_at(expiry, payload)
    }

    pub fn schedule_at(&self, expiry: Instant, payload: T) -> Result<TimerId> {
        let mut inner = self.inner.lock();
        if let Some(limit) = self.limit {
            if inner.heap.len() >= limit {
                return Err(Error::CapacityExceeded("timer heap is full"));
            }
        }
        let id = inner.insert(expiry, payload)?;
        trace!(timer = %id, pending = inner.heap.len(), "timer scheduled");
        Ok(id)
    }

    /// Remove a pending entry.
    ///
    /// Returns `false` if the entry already fired, was already cancelled or
    /// never belonged to this heap.
    pub fn cancel(&self, id: TimerId) -> bool {
        self.cancel_take(id).is_some()
    }

    /// Like [`cancel`](Self::cancel) but hands back the payload
    pub fn cancel_take(&self, id: TimerId) -> Option<T> {
        let removed = {
            let mut inner = self.inner.lock();
            let pos = inner.position_of(id)?;
            inner.remove_at(pos).1
        };
        trace!(timer = %id, "timer cancelled");
        Some(removed.payload)
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.inner.lock().position_of(id).is_some()
    }

    /// Fire up to `max_count` entries whose expiry is not later than now, in
    /// expiry order. Returns how many fired.
    pub fn poll<F>(&self, max_count: usize, mut handler: F) -> usize
    where
        F: FnMut(TimerId, T),
    {
        let now = self.clock.now();
        let cutoff = self.inner.lock().next_seq;
        let mut fired = 0;

        while fired < max_count {
            let due = {
                let mut inner = self.inner.lock();
                match inner.heap.first() {
                    Some(top) if top.expiry <= now && top.seq < cutoff => {
                        let (id, entry) = inner.remove_at(0);
                        Some((id, entry.payload))
                    }
                    _ => None,
                }
            };

            let Some((id, payload)) = due else {
                break;
            };
            trace!(timer = %id, "timer fired");
            handler(id, payload);
            fired += 1;
        }

        fired
    }

    pub fn next_expiry(&self) -> Option<Instant> {
        self.inner.lock().heap.first().map(|e| e.expiry)
    }

    /// Zero if something is already due
    pub fn time_until_next(&self) -> Option<Duration> {
        let next = self.next_expiry()?;
        Some(next.saturating_duration_since(self.clock.now()))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TimerHeap<TimerCallback> {
    pub fn schedule_callback<F>(&self, delay: Duration, callback: F) -> Result<TimerId>
    where
        F: FnOnce(TimerId) + Send + 'static,
    {
        self.schedule(delay, Box::new(callback))
    }

    /// Run due callbacks; see [`poll`](Self::poll)
    pub fn poll_callbacks(&self, max_count: usize) -> usize {
        self.poll(max_count, |id, callback| callback(id))
    }
}

impl<T> Default for TimerHeap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for TimerHeap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHeap")
            .field("pending", &self.len())
            .field("limit", &self.limit)
            .finish()
    }
}
