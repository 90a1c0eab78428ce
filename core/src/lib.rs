use core::time::Duration;

pub use ai::*;
pub use chaos::*;
pub use effects::*;
pub use engine::*;
pub use error::*;
pub use evaluator::*;
pub use generator::*;
pub use grid::*;
pub use input::*;
pub use level::*;
pub use powerup::*;
pub use progress::*;
pub use tile::*;
pub use timer::*;
pub use types::*;

mod ai;
mod chaos;
mod effects;
mod engine;
mod error;
mod evaluator;
mod generator;
mod grid;
mod input;
mod level;
mod powerup;
mod progress;
mod tile;
mod timer;
mod types;

/// Lives at the start of every attempt.
pub const MAX_LIVES: u8 = 3;

/// Score of a fully restored grid.
pub const MAX_SCORE: u16 = 1000;

/// Last campaign level.
pub const MAX_LEVEL: u32 = 100;

/// Largest accepted row or column count.
pub const MAX_GRID_DIM: Coord = 12;

/// Highest color index, `0` being the empty tile.
pub const MAX_TILE_KIND: TileKind = 6;

/// Floor for any chaos interval, keeps a hostile descriptor from firing on
/// every poll.
pub const MIN_CHAOS_INTERVAL_MS: u32 = 500;

pub const CHAOS_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub const MEMORIZE_TICK: Duration = Duration::from_secs(1);

/// How long the strike notice stays up.
pub const STRIKE_NOTICE: Duration = Duration::from_secs(2);

pub const GENERATED_CHAOS_INTERVAL_MS: u32 = 8000;

pub const GENERATED_MEMORIZE_SECS: u8 = 5;

/// Reshuffles tried before accepting an already solved scramble.
pub const MAX_SCRAMBLE_ATTEMPTS: u8 = 8;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    NoChange,
    Changed,
}

impl Outcome {
    pub const fn has_update(self) -> bool {
        match self {
            Self::NoChange => false,
            Self::Changed => true,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SwapOutcome {
    NoChange,
    Swapped,
    Won,
}

impl SwapOutcome {
    pub const fn has_update(self) -> bool {
        use SwapOutcome::*;
        match self {
            NoChange => false,
            Swapped => true,
            Won => true,
        }
    }
}
