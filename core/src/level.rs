use core::fmt;
use core::time::Duration;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::*;

/// The color-index matrix the player has to reconstruct.
///
/// Always rectangular, non-empty, within [`MAX_GRID_DIM`] on both axes, and
/// with every entry in `0..=MAX_TILE_KIND`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<i64>>", into = "Vec<Vec<i64>>")]
pub struct TargetPattern {
    kinds: Array2<TileKind>,
}

impl TargetPattern {
    /// Validates a raw row-major matrix, as handed over by external
    /// generators.
    pub fn from_rows(rows: &[Vec<i64>]) -> Result<Self> {
        let expected = rows.first().map(Vec::len).unwrap_or(0);
        if expected == 0 {
            return Err(GameError::EmptyPattern);
        }
        if rows.len() > MAX_GRID_DIM as usize || expected > MAX_GRID_DIM as usize {
            return Err(GameError::PatternTooLarge {
                rows: rows.len(),
                cols: expected,
            });
        }

        let mut flat = Vec::with_capacity(rows.len() * expected);
        for (index, row) in rows.iter().enumerate() {
            if row.len() != expected {
                return Err(GameError::RaggedPattern {
                    row: index,
                    expected,
                    found: row.len(),
                });
            }
            for &value in row.iter() {
                flat.push(validate_kind(value)?);
            }
        }

        let kinds = Array2::from_shape_vec((rows.len(), expected), flat)
            .map_err(|_| GameError::EmptyPattern)?;
        Ok(Self { kinds })
    }

    /// The curve generator stays within the pattern limits by construction.
    pub(crate) fn new_unchecked(kinds: Array2<TileKind>) -> Self {
        Self { kinds }
    }

    pub fn from_array(kinds: Array2<TileKind>) -> Result<Self> {
        let (rows, cols) = kinds.dim();
        if rows == 0 || cols == 0 {
            return Err(GameError::EmptyPattern);
        }
        if rows > MAX_GRID_DIM as usize || cols > MAX_GRID_DIM as usize {
            return Err(GameError::PatternTooLarge { rows, cols });
        }
        if let Some(&bad) = kinds.iter().find(|&&kind| kind > MAX_TILE_KIND) {
            return Err(GameError::InvalidTileKind(bad.into()));
        }
        Ok(Self { kinds })
    }

    pub fn size(&self) -> Coord2 {
        let (rows, cols) = self.kinds.dim();
        // bounded by MAX_GRID_DIM on construction
        (rows as Coord, cols as Coord)
    }

    pub fn total_cells(&self) -> CellCount {
        let (rows, cols) = self.size();
        mult(rows, cols)
    }

    pub fn kind_at(&self, coords: Coord2) -> TileKind {
        self.kinds[coords.to_nd_index()]
    }

    pub fn as_array(&self) -> &Array2<TileKind> {
        &self.kinds
    }

    pub fn to_rows(&self) -> Vec<Vec<i64>> {
        self.kinds
            .rows()
            .into_iter()
            .map(|row| row.iter().map(|&kind| i64::from(kind)).collect())
            .collect()
    }
}

fn validate_kind(value: i64) -> Result<TileKind> {
    TileKind::try_from(value)
        .ok()
        .filter(|&kind| kind <= MAX_TILE_KIND)
        .ok_or(GameError::InvalidTileKind(value))
}

impl TryFrom<Vec<Vec<i64>>> for TargetPattern {
    type Error = GameError;

    fn try_from(rows: Vec<Vec<i64>>) -> Result<Self> {
        Self::from_rows(&rows)
    }
}

impl From<TargetPattern> for Vec<Vec<i64>> {
    fn from(pattern: TargetPattern) -> Self {
        pattern.to_rows()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Insane,
}

impl Difficulty {
    /// Extra charges granted on top of the base inventory.
    pub const fn powerup_bonus(self) -> u8 {
        match self {
            Self::Easy | Self::Medium => 0,
            Self::Hard => 1,
            Self::Insane => 2,
        }
    }
}

/// Where a level came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LevelId {
    /// Numbered campaign level, starting at 1.
    Campaign(u32),
    /// Produced from a free-text prompt; never persisted.
    Generated,
}

impl LevelId {
    /// Numeric form used by the presentation layer, `-1` for generated levels.
    pub fn number(self) -> i64 {
        match self {
            Self::Campaign(n) => n.into(),
            Self::Generated => -1,
        }
    }

    pub const fn campaign_number(self) -> Option<u32> {
        match self {
            Self::Campaign(n) => Some(n),
            Self::Generated => None,
        }
    }
}

impl fmt::Display for LevelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Campaign(n) => write!(f, "Level {n}"),
            Self::Generated => f.write_str("AI Generated"),
        }
    }
}

/// Immutable description of one play session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub id: LevelId,
    pub difficulty: Difficulty,
    pub pattern: TargetPattern,
    pub chaos_interval_ms: u32,
    pub memorize_secs: u8,
}

impl Level {
    pub fn new(
        id: LevelId,
        difficulty: Difficulty,
        pattern: TargetPattern,
        chaos_interval_ms: u32,
        memorize_secs: u8,
    ) -> Self {
        Self {
            id,
            difficulty,
            pattern,
            chaos_interval_ms: chaos_interval_ms.max(MIN_CHAOS_INTERVAL_MS),
            memorize_secs,
        }
    }

    /// Wraps a pattern returned by the AI generator.
    pub fn generated(pattern: TargetPattern) -> Self {
        Self::new(
            LevelId::Generated,
            Difficulty::Insane,
            pattern,
            GENERATED_CHAOS_INTERVAL_MS,
            GENERATED_MEMORIZE_SECS,
        )
    }

    pub fn grid_size(&self) -> Coord2 {
        self.pattern.size()
    }

    pub fn chaos_interval(&self) -> Duration {
        Duration::from_millis(self.chaos_interval_ms.into())
    }
}
