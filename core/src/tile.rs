use serde::{Deserialize, Serialize};

/// Color index of a tile, `0` is the empty tile.
pub type TileKind = u8;

pub const EMPTY_TILE: TileKind = 0;

/// Stable identity of a tile, independent of where it currently sits.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileId(u32);

impl TileId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

/// One cell of the live grid.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub id: TileId,
    pub kind: TileKind,
    pub locked: bool,
}

impl Tile {
    pub const fn new(id: TileId, kind: TileKind) -> Self {
        Self {
            id,
            kind,
            locked: false,
        }
    }

    pub const fn is_empty(self) -> bool {
        self.kind == EMPTY_TILE
    }
}
