use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::model::q_table::{DiscreteState, QTable};
use crate::prelude::Action;

/// Epsilon-greedy action selection on top of a [QTable].
pub struct EpsilonGreedy {
    rng: StdRng,
}

impl EpsilonGreedy {
    /// A seeded policy makes the whole training run reproducible; without a seed it draws from OS entropy.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    pub fn choose<A: Action>(
        &mut self,
        q_table: &QTable<A>,
        state: DiscreteState,
        exploration_rate: f64,
    ) -> A {
        if self.rng.gen::<f64>() < exploration_rate {
            A::from_numeric(self.rng.gen_range(0..A::ACTION_SPACE))
        } else {
            q_table.best_action(state)
        }
    }
}

/// Probability of taking a random action.
/// Non-increasing over its lifetime and never below its floor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExplorationRate {
    value: f64,
    decay: f64,
    min: f64,
}

impl ExplorationRate {
    pub fn new(
        initial: f64,
        decay: f64,
        min: f64,
    ) -> Self {
        assert!((0.0..=1.0).contains(&min), "min exploration rate must be within [0, 1]");
        assert!((0.0..=1.0).contains(&decay), "exploration decay must be within [0, 1]");
        Self {
            value: initial.clamp(min, 1.0),
            decay,
            min,
        }
    }

    pub fn value(&self) -> f64 { self.value }

    /// Applies one episode worth of decay and returns the new rate
    pub fn decay(&mut self) -> f64 {
        self.value = f64::max(self.value * self.decay, self.min);
        self.value
    }
}
