//! Randomness used by the game: die rolls and automated choices.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

/// Source of die values and uniform choices.
///
/// Production code uses [`GameRng`]; tests plug in fixed sequences.
pub trait DiceSource: Send {
    /// Returns a uniform value in 1..=6.
    fn roll_die(&mut self) -> u8;

    /// Returns a uniform index in `0..upper`. `upper` is never zero.
    fn pick(&mut self, upper: usize) -> usize;
}

/// ChaCha-backed RNG, seedable for reproducible sessions.
#[derive(Debug, Clone)]
pub struct GameRng {
    inner: ChaCha8Rng,
}

impl GameRng {
    /// Creates an RNG with a fixed seed.
    #[instrument]
    pub fn seeded(seed: u64) -> Self {
        debug!(seed, "Seeding dice RNG");
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Creates an RNG seeded from the operating system.
    #[instrument]
    pub fn from_entropy() -> Self {
        Self {
            inner: ChaCha8Rng::from_entropy(),
        }
    }
}

impl DiceSource for GameRng {
    fn roll_die(&mut self) -> u8 {
        self.inner.gen_range(1..=6)
    }

    fn pick(&mut self, upper: usize) -> usize {
        self.inner.gen_range(0..upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolls_stay_in_range() {
        let mut rng = GameRng::seeded(7);
        for _ in 0..1000 {
            let value = rng.roll_die();
            assert!((1..=6).contains(&value));
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = GameRng::seeded(42);
        let mut b = GameRng::seeded(42);
        let rolls_a: Vec<u8> = (0..20).map(|_| a.roll_die()).collect();
        let rolls_b: Vec<u8> = (0..20).map(|_| b.roll_die()).collect();
        assert_eq!(rolls_a, rolls_b);
    }

    #[test]
    fn test_pick_within_bounds() {
        let mut rng = GameRng::seeded(3);
        for upper in 1..5 {
            assert!(rng.pick(upper) < upper);
        }
    }
}
