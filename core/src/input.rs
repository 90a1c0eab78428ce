use crate::Coord2;

/// What a tap on the board asks the engine to do.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TapIntent {
    Select(Coord2),
    Deselect,
    Swap(Coord2, Coord2),
    Lock(Coord2),
}

/// Caller-side tap state: the pending selection and whether the next tap
/// places a lock.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TileSelector {
    selected: Option<Coord2>,
    locking: bool,
}

impl TileSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<Coord2> {
        self.selected
    }

    pub fn is_locking(&self) -> bool {
        self.locking
    }

    /// The next tap locks instead of selecting.
    pub fn arm_lock(&mut self) {
        self.locking = true;
        self.selected = None;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn tap(&mut self, coords: Coord2) -> TapIntent {
        if self.locking {
            self.locking = false;
            return TapIntent::Lock(coords);
        }

        match self.selected.take() {
            None => {
                self.selected = Some(coords);
                TapIntent::Select(coords)
            }
            Some(first) if first == coords => TapIntent::Deselect,
            Some(first) => TapIntent::Swap(first, coords),
        }
    }
}
