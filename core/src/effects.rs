use core::time::Duration;
use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::PowerUpKind;

/// Read-only view of which timed effects are running.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveEffects {
    pub frozen: bool,
    pub slowed: bool,
    pub peeking: bool,
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct Freeze {
    since: Instant,
    until: Instant,
}

/// Expiry bookkeeping for the timed powerups.
///
/// Expiry is driven from outside: the engine schedules a timer for the
/// instant returned by [`EffectManager::activate`] and calls
/// [`EffectManager::expire`] when it fires. A timer left over from an
/// earlier activation finds a later expiry and does nothing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EffectManager {
    frozen: Option<Freeze>,
    slowed_until: Option<Instant>,
    peeking_until: Option<Instant>,
}

impl EffectManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts or re-arms a timed effect and returns its new expiry.
    ///
    /// Durations never stack: re-activation restarts the full duration from
    /// `now`. A running freeze keeps its original start so the chaos meter
    /// stays where it was.
    pub fn activate(&mut self, kind: PowerUpKind, now: Instant) -> Option<Instant> {
        let until = now + kind.duration()?;
        match kind {
            PowerUpKind::Freeze => {
                let since = self.frozen.map_or(now, |freeze| freeze.since);
                self.frozen = Some(Freeze { since, until });
            }
            PowerUpKind::SlowChaos => self.slowed_until = Some(until),
            PowerUpKind::Peek => self.peeking_until = Some(until),
            PowerUpKind::LockTile => return None,
        }
        Some(until)
    }

    /// Ends `kind` if its expiry is due at `at`. Returns whether it ended.
    pub fn expire(&mut self, kind: PowerUpKind, at: Instant) -> bool {
        let slot_until = match kind {
            PowerUpKind::Freeze => self.frozen.map(|freeze| freeze.until),
            PowerUpKind::SlowChaos => self.slowed_until,
            PowerUpKind::Peek => self.peeking_until,
            PowerUpKind::LockTile => None,
        };
        match slot_until {
            Some(until) if until <= at => {
                match kind {
                    PowerUpKind::Freeze => self.frozen = None,
                    PowerUpKind::SlowChaos => self.slowed_until = None,
                    PowerUpKind::Peek => self.peeking_until = None,
                    PowerUpKind::LockTile => {}
                }
                true
            }
            _ => false,
        }
    }

    pub fn snapshot(&self) -> ActiveEffects {
        ActiveEffects {
            frozen: self.frozen.is_some(),
            slowed: self.slowed_until.is_some(),
            peeking: self.peeking_until.is_some(),
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.is_some()
    }

    pub fn is_slowed(&self) -> bool {
        self.slowed_until.is_some()
    }

    pub fn is_peeking(&self) -> bool {
        self.peeking_until.is_some()
    }

    /// When the running freeze started, if any.
    pub fn frozen_since(&self) -> Option<Instant> {
        self.frozen.map(|freeze| freeze.since)
    }

    pub fn remaining(&self, kind: PowerUpKind, now: Instant) -> Option<Duration> {
        let until = match kind {
            PowerUpKind::Freeze => self.frozen.map(|freeze| freeze.until),
            PowerUpKind::SlowChaos => self.slowed_until,
            PowerUpKind::Peek => self.peeking_until,
            PowerUpKind::LockTile => None,
        }?;
        Some(until.saturating_duration_since(now))
    }

    /// Shifts every running effect by a pause of length `paused`.
    pub fn postpone(&mut self, paused: Duration) {
        if let Some(freeze) = &mut self.frozen {
            freeze.since += paused;
            freeze.until += paused;
        }
        if let Some(until) = &mut self.slowed_until {
            *until += paused;
        }
        if let Some(until) = &mut self.peeking_until {
            *until += paused;
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
