use core::time::Duration;
use serde::{Deserialize, Serialize};

use crate::Difficulty;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerUpKind {
    /// Suspends the chaos scheduler.
    Freeze,
    /// Locks the next picked tile, shielding its row and column.
    LockTile,
    /// Doubles the chaos interval.
    SlowChaos,
    /// Reveals the target pattern.
    Peek,
}

impl PowerUpKind {
    pub const ALL: [Self; 4] = [Self::Freeze, Self::LockTile, Self::SlowChaos, Self::Peek];

    /// How long the timed effect lasts, `None` for instantaneous powerups.
    pub const fn duration(self) -> Option<Duration> {
        match self {
            Self::Freeze => Some(Duration::from_secs(5)),
            Self::SlowChaos => Some(Duration::from_secs(10)),
            Self::Peek => Some(Duration::from_secs(2)),
            Self::LockTile => None,
        }
    }

    pub const fn base_charges(self) -> u8 {
        match self {
            Self::Freeze => 1,
            Self::LockTile => 2,
            Self::SlowChaos => 1,
            Self::Peek => 3,
        }
    }

    const fn slot(self) -> usize {
        match self {
            Self::Freeze => 0,
            Self::LockTile => 1,
            Self::SlowChaos => 2,
            Self::Peek => 3,
        }
    }
}

/// Remaining charges per powerup kind.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    charges: [u8; 4],
}

impl Inventory {
    /// Starting inventory for a level. Peek never gets a bonus.
    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        let bonus = difficulty.powerup_bonus();
        let mut inventory = Self::default();
        for kind in PowerUpKind::ALL {
            let extra = if kind == PowerUpKind::Peek { 0 } else { bonus };
            inventory.charges[kind.slot()] = kind.base_charges() + extra;
        }
        inventory
    }

    pub fn charges(&self, kind: PowerUpKind) -> u8 {
        self.charges[kind.slot()]
    }

    pub fn has_charge(&self, kind: PowerUpKind) -> bool {
        self.charges(kind) > 0
    }

    /// Takes one charge, returns `false` without touching anything when
    /// empty.
    pub fn try_consume(&mut self, kind: PowerUpKind) -> bool {
        match self.charges[kind.slot()].checked_sub(1) {
            Some(left) => {
                self.charges[kind.slot()] = left;
                true
            }
            None => false,
        }
    }
}
