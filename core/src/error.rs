use thiserror::Error;

use crate::GamePhase;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Invalid coordinates")]
    InvalidCoords,
    #[error("Target pattern is empty")]
    EmptyPattern,
    #[error("Target pattern row {row} has {found} cells, expected {expected}")]
    RaggedPattern {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Target pattern of {rows}x{cols} exceeds the maximum grid size")]
    PatternTooLarge { rows: usize, cols: usize },
    #[error("Tile kind {0} is out of range")]
    InvalidTileKind(i64),
    #[error("Level {0} is out of range")]
    LevelOutOfRange(u32),
    #[error("Level {0} is still locked")]
    LevelLocked(u32),
    #[error("AI request was superseded")]
    StaleRequest,
    #[error("Cannot load a level while {0:?}")]
    IllegalState(GamePhase),
    #[error(transparent)]
    Generator(#[from] GeneratorError),
}

/// Failure reported by the external AI level generator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("AI generator is not configured")]
    Unavailable,
    #[error("AI generator rejected the credentials")]
    Unauthorized,
    #[error("AI generator request failed: {0}")]
    Network(String),
    #[error("AI generator returned an unreadable response: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = core::result::Result<T, GameError>;
