use core::ops::Index;
use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::*;

/// Result of rotating a full row or column.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineShift {
    Shifted,
    /// A locked tile sits on the line, nothing moved.
    Blocked,
}

/// The live tile matrix of one level attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    tiles: Array2<Tile>,
}

impl Grid {
    /// Builds the solved grid for `pattern`, handing out fresh tile ids in
    /// row-major order.
    pub fn from_pattern(pattern: &TargetPattern) -> Self {
        let mut next_id = 0;
        let tiles = pattern.as_array().map(|&kind| {
            let tile = Tile::new(TileId::new(next_id), kind);
            next_id += 1;
            tile
        });
        Self { tiles }
    }

    pub fn size(&self) -> Coord2 {
        let (rows, cols) = self.tiles.dim();
        (rows as Coord, cols as Coord)
    }

    pub fn total_cells(&self) -> CellCount {
        let (rows, cols) = self.size();
        mult(rows, cols)
    }

    pub fn validate_coords(&self, coords: Coord2) -> Result<Coord2> {
        let size = self.size();
        if coords.0 < size.0 && coords.1 < size.1 {
            Ok(coords)
        } else {
            Err(GameError::InvalidCoords)
        }
    }

    pub fn tile_at(&self, coords: Coord2) -> Tile {
        self[coords]
    }

    pub fn tiles(&self) -> &Array2<Tile> {
        &self.tiles
    }

    pub fn kinds(&self) -> Array2<TileKind> {
        self.tiles.map(|tile| tile.kind)
    }

    /// Exchanges two tiles. Locked tiles and same-cell swaps are ignored.
    pub fn swap(&mut self, a: Coord2, b: Coord2) -> Result<Outcome> {
        let a = self.validate_coords(a)?;
        let b = self.validate_coords(b)?;

        if a == b || self[a].locked || self[b].locked {
            return Ok(Outcome::NoChange);
        }

        self.tiles.swap(a.to_nd_index(), b.to_nd_index());
        Ok(Outcome::Changed)
    }

    /// Marks a tile as locked. Locking an already locked tile still reports
    /// a change so callers charge for it uniformly.
    pub fn lock(&mut self, coords: Coord2) -> Result<Outcome> {
        let coords = self.validate_coords(coords)?;
        self.tiles[coords.to_nd_index()].locked = true;
        Ok(Outcome::Changed)
    }

    pub fn line_len(&self, axis: Axis) -> Coord {
        let (rows, cols) = self.size();
        match axis {
            Axis::Row => cols,
            Axis::Column => rows,
        }
    }

    /// Number of lines along `axis`: rows for [`Axis::Row`], columns for
    /// [`Axis::Column`].
    pub fn line_count(&self, axis: Axis) -> Coord {
        let (rows, cols) = self.size();
        match axis {
            Axis::Row => rows,
            Axis::Column => cols,
        }
    }

    pub fn line_is_locked(&self, axis: Axis, index: Coord) -> bool {
        self.line_coords(axis, index).any(|coords| self[coords].locked)
    }

    /// Cyclically shifts one row or column by a single cell.
    ///
    /// The whole rotation is rejected when any tile on the line is locked.
    pub fn rotate_line(
        &mut self,
        axis: Axis,
        index: Coord,
        direction: Direction,
    ) -> Result<LineShift> {
        if index >= self.line_count(axis) {
            return Err(GameError::InvalidCoords);
        }
        if self.line_is_locked(axis, index) {
            return Ok(LineShift::Blocked);
        }

        let positions: Vec<Coord2> = self.line_coords(axis, index).collect();
        let mut line: Vec<Tile> = positions.iter().map(|&coords| self[coords]).collect();
        match direction {
            Direction::Forward => line.rotate_right(1),
            Direction::Backward => line.rotate_left(1),
        }
        for (coords, tile) in positions.into_iter().zip(line) {
            self.tiles[coords.to_nd_index()] = tile;
        }

        Ok(LineShift::Shifted)
    }

    /// Fisher-Yates over the flattened tile list. Lock state is not
    /// consulted.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut flat: Vec<Tile> = self.tiles.iter().copied().collect();
        for i in (1..flat.len()).rev() {
            let j = rng.random_range(0..=i);
            flat.swap(i, j);
        }
        for (cell, tile) in self.tiles.iter_mut().zip(flat) {
            *cell = tile;
        }
    }

    fn line_coords(&self, axis: Axis, index: Coord) -> impl Iterator<Item = Coord2> + use<> {
        let len = self.line_len(axis);
        (0..len).map(move |i| match axis {
            Axis::Row => (index, i),
            Axis::Column => (i, index),
        })
    }
}

impl Index<Coord2> for Grid {
    type Output = Tile;

    fn index(&self, (row, col): Coord2) -> &Self::Output {
        &self.tiles[(row as usize, col as usize)]
    }
}
