use std::marker::PhantomData;

use crate::prelude::Action;

/// Bucketed, bounded representation of an observation: (horizontal bucket, vertical bucket).
///
/// Both components are expected in `[0, resolution - 1]`; the [crate::model::discretizer::Discretizer] guarantees that.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct DiscreteState(pub usize, pub usize);

/// Dense lookup table (state, action) -> estimated return.
///
/// Backed by a contiguous array of shape `[resolution, resolution, A::ACTION_SPACE]`.
#[derive(Debug, Clone, PartialEq)]
pub struct QTable<A: Action> {
    resolution: usize,
    values: Vec<f64>,
    _action: PhantomData<A>,
}

impl<A: Action> QTable<A> {
    /// All-zero table
    pub fn new(resolution: usize) -> Self {
        assert!(resolution > 0, "resolution must be positive");
        Self {
            resolution,
            values: vec![0.0; resolution * resolution * Self::action_space()],
            _action: PhantomData,
        }
    }

    pub(crate) fn from_values(
        resolution: usize,
        values: Vec<f64>,
    ) -> Self {
        debug_assert_eq!(values.len(), resolution * resolution * Self::action_space());
        Self {
            resolution,
            values,
            _action: PhantomData,
        }
    }

    pub fn action_space() -> usize { A::ACTION_SPACE as usize }

    pub fn resolution(&self) -> usize { self.resolution }

    /// The raw dense array in row-major order `[horizontal][vertical][action]`
    pub fn values(&self) -> &[f64] { &self.values }

    fn state_offset(
        &self,
        state: DiscreteState,
    ) -> usize {
        assert!(
            state.0 < self.resolution && state.1 < self.resolution,
            "state {:?} out of bounds for resolution {}",
            state,
            self.resolution
        );
        (state.0 * self.resolution + state.1) * Self::action_space()
    }

    fn index(
        &self,
        state: DiscreteState,
        action: A,
    ) -> usize {
        let a = action.numeric() as usize;
        assert!(a < Self::action_space(), "invalid action index {} for action {}", a, action);
        self.state_offset(state) + a
    }

    pub fn value(
        &self,
        state: DiscreteState,
        action: A,
    ) -> f64 {
        self.values[self.index(state, action)]
    }

    /// Estimates of all actions at `state`, indexed by [Action::numeric]
    pub fn action_values(
        &self,
        state: DiscreteState,
    ) -> &[f64] {
        let offset = self.state_offset(state);
        &self.values[offset..offset + Self::action_space()]
    }

    /// Argmax over the action axis. Ties resolve to the lowest action index.
    pub fn best_action(
        &self,
        state: DiscreteState,
    ) -> A {
        let values = self.action_values(state);
        let mut best = 0;
        for (i, &v) in values.iter().enumerate().skip(1) {
            if v > values[best] {
                best = i;
            }
        }
        A::from_numeric(best as u8)
    }

    pub fn max_value(
        &self,
        state: DiscreteState,
    ) -> f64 {
        self.value(state, self.best_action(state))
    }

    pub fn update(
        &mut self,
        state: DiscreteState,
        action: A,
        new_value: f64,
    ) {
        let i = self.index(state, action);
        self.values[i] = new_value;
    }

    /// One-step Q-learning (off-policy TD control)
    ///
    /// Q(s,a) ← Q(s,a) + α[r + γ Q(s', argmax_a' Q(s',a')) - Q(s,a)]
    ///
    /// The bootstrap term is kept on terminal transitions too. Returns the new estimate.
    pub fn q_learning_update(
        &mut self,
        state: DiscreteState,
        action: A,
        reward: f64,
        next_state: DiscreteState,
        learning_rate: f64,
        discount_factor: f64,
    ) -> f64 {
        let best_next = self.best_action(next_state);
        let td_target = reward + discount_factor * self.value(next_state, best_next);
        let current = self.value(state, action);
        let td_error = td_target - current;
        let new_value = current + learning_rate * td_error;
        self.update(state, action, new_value);
        new_value
    }
}
