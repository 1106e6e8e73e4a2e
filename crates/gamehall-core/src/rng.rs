//! Seedable randomness for shuffles and role assignment.
//!
//! Every match owns one `GameRng`. Seeding it makes deck shuffles, tile
//! walls and role permutations reproducible in tests and replays.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Deterministic RNG wrapper owned by a match
#[derive(Debug, Clone)]
pub struct GameRng {
    inner: StdRng,
    seed: u64,
}

impl GameRng {
    /// Create an RNG from an explicit seed
    pub fn with_seed(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    /// Create an RNG seeded from the OS
    pub fn from_entropy() -> Self {
        Self::with_seed(rand::thread_rng().gen())
    }

    /// The seed this RNG was created with
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Derive an independent RNG, e.g. for a new match cloned from a prototype
    pub fn fork(&mut self) -> Self {
        Self::with_seed(self.inner.gen())
    }

    /// Shuffle a slice in place
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.inner);
    }
}

impl Default for GameRng {
    fn default() -> Self {
        Self::from_entropy()
    }
}
