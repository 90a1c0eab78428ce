use core::cmp::Ordering;
use core::time::Duration;
use std::collections::BinaryHeap;
use web_time::Instant;

use crate::PowerUpKind;

/// Deferred work owned by the engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TimerEvent {
    /// One second of the memorize countdown elapsed.
    MemorizeTick,
    /// Periodic chaos check while playing.
    ChaosPoll,
    /// A timed powerup may have run out.
    EffectExpiry(PowerUpKind),
    /// The transient strike notice should disappear.
    ClearNotice,
}

#[derive(Copy, Clone, Debug)]
struct Entry {
    due: Instant,
    seq: u64,
    event: TimerEvent,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // reversed, so the max-heap yields the earliest deadline first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Cooperative deadline queue.
///
/// Nothing runs on its own: the owner drains due entries with
/// [`TimerQueue::pop_due`] whenever it is ticked. Entries with the same
/// deadline come out in scheduling order.
#[derive(Clone, Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: Instant, event: TimerEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry { due, seq, event });
    }

    /// Removes and returns the earliest entry due at or before `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<(Instant, TimerEvent)> {
        if self.heap.peek()?.due > now {
            return None;
        }
        self.heap.pop().map(|entry| (entry.due, entry.event))
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.heap.peek().map(|entry| entry.due)
    }

    /// Drops every pending entry matching `predicate`.
    pub fn cancel(&mut self, mut predicate: impl FnMut(TimerEvent) -> bool) {
        self.heap.retain(|entry| !predicate(entry.event));
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Moves every pending deadline later by `delay`.
    pub fn postpone(&mut self, delay: Duration) {
        self.heap = self
            .heap
            .drain()
            .map(|mut entry| {
                entry.due += delay;
                entry
            })
            .collect();
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn contains(&self, event: TimerEvent) -> bool {
        self.heap.iter().any(|entry| entry.event == event)
    }
}
