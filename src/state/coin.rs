//! Random source used for mark and first-turn assignment.

use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

use rand::{Rng, SeedableRng, rngs::StdRng};

/// Fair coin consulted by [`crate::state::game::Match::join`].
///
/// `true` gives the first player [`crate::state::board::Mark::X`] and, when the match starts,
/// hands the first turn to the first slot.
pub trait CoinFlip: Send + Sync {
    /// Draw one outcome.
    fn flip(&self) -> bool;
}

/// Coin backed by the thread-local generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCoin;

impl CoinFlip for RandomCoin {
    fn flip(&self) -> bool {
        rand::random::<bool>()
    }
}

/// Reproducible coin seeded once at construction.
#[derive(Debug)]
pub struct SeededCoin {
    rng: Mutex<StdRng>,
}

impl SeededCoin {
    /// Build a coin whose sequence is fully determined by `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl CoinFlip for SeededCoin {
    fn flip(&self) -> bool {
        match self.rng.lock() {
            Ok(mut rng) => rng.random(),
            Err(poisoned) => poisoned.into_inner().random(),
        }
    }
}

/// Coin replaying a fixed sequence of outcomes, cycling once exhausted.
#[derive(Debug)]
pub struct FixedCoin {
    outcomes: Vec<bool>,
    next: AtomicUsize,
}

impl FixedCoin {
    /// Replay `outcomes` in order. An empty sequence always yields `true`.
    pub fn new(outcomes: impl Into<Vec<bool>>) -> Self {
        Self {
            outcomes: outcomes.into(),
            next: AtomicUsize::new(0),
        }
    }

    /// Coin that always lands on `outcome`.
    pub fn always(outcome: bool) -> Self {
        Self::new(vec![outcome])
    }
}

impl CoinFlip for FixedCoin {
    fn flip(&self) -> bool {
        if self.outcomes.is_empty() {
            return true;
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        self.outcomes[index % self.outcomes.len()]
    }
}
