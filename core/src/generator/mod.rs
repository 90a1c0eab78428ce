use crate::*;
pub use curve::*;

mod curve;

/// Produces the descriptor for a campaign level number.
pub trait LevelGenerator {
    fn generate(&mut self, level: u32) -> Level;
}

impl<G: LevelGenerator + ?Sized> LevelGenerator for &mut G {
    fn generate(&mut self, level: u32) -> Level {
        (**self).generate(level)
    }
}

impl<G: LevelGenerator + ?Sized> LevelGenerator for Box<G> {
    fn generate(&mut self, level: u32) -> Level {
        (**self).generate(level)
    }
}
