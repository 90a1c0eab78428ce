use ndarray::Array2;
use rand::prelude::*;

use super::*;

/// Tuning of one campaign level, before the pattern is rolled.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LevelCurve {
    pub grid_size: Coord,
    pub colors: TileKind,
    pub empty_chance: f64,
    pub chaos_interval_ms: u32,
    pub memorize_secs: u8,
    pub difficulty: Difficulty,
}

impl LevelCurve {
    /// Difficulty curve over the campaign. Levels past [`MAX_LEVEL`] get the
    /// last level's tuning.
    pub fn for_level(level: u32) -> Self {
        let level = level.clamp(1, MAX_LEVEL);
        let grid_size = match level {
            ..=5 => 3,
            ..=20 => 4,
            _ => 5,
        };
        let colors = (2 + (level - 1) / 15).min(u32::from(MAX_TILE_KIND)) as TileKind;
        // the first stage is kept free of empty tiles
        let empty_chance = if level <= 5 { 0.0 } else { 0.2 };
        let chaos_interval_ms = 18_000u32
            .saturating_sub((level - 1) * 150)
            .max(MIN_CHAOS_INTERVAL_MS);
        let memorize_secs = match level {
            ..=5 => 6,
            ..=20 => 5,
            ..=40 => 4,
            _ => 3,
        };
        let difficulty = match level {
            ..=10 => Difficulty::Easy,
            ..=40 => Difficulty::Medium,
            ..=80 => Difficulty::Hard,
            _ => Difficulty::Insane,
        };

        Self {
            grid_size,
            colors,
            empty_chance,
            chaos_interval_ms,
            memorize_secs,
            difficulty,
        }
    }
}

/// Campaign generator: fixed tuning curve, random target pattern.
#[derive(Clone, Debug)]
pub struct CurveGenerator {
    rng: SmallRng,
}

impl CurveGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    fn roll_pattern(&mut self, curve: &LevelCurve) -> Array2<TileKind> {
        let size = usize::from(curve.grid_size);
        Array2::from_shape_simple_fn((size, size), || {
            if curve.empty_chance > 0.0 && self.rng.random_bool(curve.empty_chance) {
                EMPTY_TILE
            } else {
                self.rng.random_range(1..=curve.colors)
            }
        })
    }
}

impl LevelGenerator for CurveGenerator {
    fn generate(&mut self, level: u32) -> Level {
        let level = level.clamp(1, MAX_LEVEL);
        let curve = LevelCurve::for_level(level);
        let kinds = self.roll_pattern(&curve);
        let pattern = TargetPattern::new_unchecked(kinds);
        log::debug!(
            "generated level {}: {}x{} grid, {} colors, {} ms chaos",
            level,
            curve.grid_size,
            curve.grid_size,
            curve.colors,
            curve.chaos_interval_ms
        );
        Level::new(
            LevelId::Campaign(level),
            curve.difficulty,
            pattern,
            curve.chaos_interval_ms,
            curve.memorize_secs,
        )
    }
}
