use core::convert::Infallible;
use core::fmt;

/// Persistent high-watermark of unlocked campaign levels.
///
/// Read once when the engine starts; written whenever a win raises the
/// watermark.
pub trait ProgressStore {
    type Error: fmt::Display;

    /// Highest playable campaign level, at least 1.
    fn max_unlocked(&self) -> u32;

    /// Raises the watermark to `level`. Lower values must leave it alone.
    fn unlock_up_to(&mut self, level: u32) -> Result<(), Self::Error>;
}

impl<S: ProgressStore + ?Sized> ProgressStore for &mut S {
    type Error = S::Error;

    fn max_unlocked(&self) -> u32 {
        (**self).max_unlocked()
    }

    fn unlock_up_to(&mut self, level: u32) -> Result<(), Self::Error> {
        (**self).unlock_up_to(level)
    }
}

/// Store that only lives as long as the process.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MemoryProgressStore {
    max_unlocked: u32,
}

impl MemoryProgressStore {
    pub fn new(max_unlocked: u32) -> Self {
        Self {
            max_unlocked: max_unlocked.max(1),
        }
    }
}

impl Default for MemoryProgressStore {
    fn default() -> Self {
        Self::new(1)
    }
}

impl ProgressStore for MemoryProgressStore {
    type Error = Infallible;

    fn max_unlocked(&self) -> u32 {
        self.max_unlocked
    }

    fn unlock_up_to(&mut self, level: u32) -> Result<(), Self::Error> {
        self.max_unlocked = self.max_unlocked.max(level);
        Ok(())
    }
}
