use serde::{Deserialize, Serialize};

use crate::*;

/// How close the live grid is to the target.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub matches: CellCount,
    pub total: CellCount,
    pub score: u16,
}

impl Evaluation {
    pub const fn is_complete(self) -> bool {
        self.matches == self.total
    }
}

/// Compares every cell's kind with the target at the same position.
///
/// `score = floor(MAX_SCORE * matches / total)`.
pub fn evaluate(grid: &Grid, target: &TargetPattern) -> Evaluation {
    let matches = grid
        .tiles()
        .iter()
        .zip(target.as_array().iter())
        .filter(|(tile, kind)| tile.kind == **kind)
        .count() as CellCount;
    let total = grid.total_cells();
    let score = if total == 0 {
        0
    } else {
        (u32::from(MAX_SCORE) * u32::from(matches) / u32::from(total)) as u16
    };
    Evaluation {
        matches,
        total,
        score,
    }
}
