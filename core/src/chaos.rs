use core::time::Duration;
use rand::Rng;
use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::*;

/// One disruptive event: rotate a full row or column by one cell.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strike {
    pub axis: Axis,
    pub index: Coord,
    pub direction: Direction,
}

impl Strike {
    /// Picks axis, line, and direction uniformly for a grid of `size`.
    pub fn roll<R: Rng + ?Sized>(rng: &mut R, (rows, cols): Coord2) -> Self {
        let axis = if rng.random_bool(0.5) { Axis::Row } else { Axis::Column };
        let lines = match axis {
            Axis::Row => rows,
            Axis::Column => cols,
        };
        let index = rng.random_range(0..lines.max(1));
        let direction = if rng.random_bool(0.5) {
            Direction::Forward
        } else {
            Direction::Backward
        };
        Self {
            axis,
            index,
            direction,
        }
    }

    pub fn apply(self, grid: &mut Grid) -> Result<LineShift> {
        grid.rotate_line(self.axis, self.index, self.direction)
    }
}

/// Absolute-deadline scheduler for chaos strikes.
///
/// Holds a single fire timestamp and, while paused, the pause start. No
/// elapsed-time counters are kept, so irregular polling cannot drift.
#[derive(Clone, Debug, PartialEq)]
pub struct ChaosScheduler {
    base_interval: Duration,
    fire_at: Instant,
    paused_at: Option<Instant>,
}

impl ChaosScheduler {
    /// Arms the scheduler so the first strike is due one base interval after
    /// `now`.
    pub fn armed(base_interval: Duration, now: Instant) -> Self {
        Self {
            base_interval,
            fire_at: now + base_interval,
            paused_at: None,
        }
    }

    pub fn base_interval(&self) -> Duration {
        self.base_interval
    }

    pub fn fire_at(&self) -> Instant {
        self.fire_at
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn effective_interval(&self, slowed: bool) -> Duration {
        if slowed {
            self.base_interval * 2
        } else {
            self.base_interval
        }
    }

    /// One poll. Returns `true` when a strike is due now, in which case the
    /// next deadline has already been scheduled.
    ///
    /// While frozen or paused the deadline is left untouched.
    pub fn poll(&mut self, now: Instant, effects: ActiveEffects) -> bool {
        if self.paused_at.is_some() || effects.frozen {
            return false;
        }
        if now < self.fire_at {
            return false;
        }
        self.fire_at = now + self.effective_interval(effects.slowed);
        true
    }

    /// Forgives the whole frozen stretch: the next strike is a full base
    /// interval after the freeze ended.
    pub fn unfreeze(&mut self, now: Instant) {
        self.fire_at = now + self.base_interval;
    }

    pub fn pause(&mut self, now: Instant) -> bool {
        if self.paused_at.is_some() {
            return false;
        }
        self.paused_at = Some(now);
        true
    }

    /// Ends a pause and pushes the deadline back by its length.
    pub fn resume(&mut self, now: Instant) -> Option<Duration> {
        let paused_at = self.paused_at.take()?;
        let paused = now.saturating_duration_since(paused_at);
        self.fire_at += paused;
        Some(paused)
    }

    /// Fill level of the chaos meter in `0.0..=100.0`.
    ///
    /// `held_since` pins the reference time, used while frozen so the meter
    /// holds still. A pause pins it the same way.
    pub fn progress(&self, now: Instant, slowed: bool, held_since: Option<Instant>) -> f32 {
        let reference = [Some(now), self.paused_at, held_since]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(now);
        let remaining = self.fire_at.saturating_duration_since(reference);
        let interval = self.effective_interval(slowed);
        if interval.is_zero() {
            return 100.0;
        }
        let ratio = remaining.as_secs_f32() / interval.as_secs_f32();
        (100.0 * (1.0 - ratio)).clamp(0.0, 100.0)
    }
}
