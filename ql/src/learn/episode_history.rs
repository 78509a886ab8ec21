use std::collections::VecDeque;

use itertools::Itertools;
use rustc_hash::FxHashMap;

use crate::prelude::Action;

/// Bounded FIFO buffer - the oldest element gets dropped once `max_buffer_len` is reached
pub struct RingBuffer<T> {
    max_buffer_len: usize,
    buffer: VecDeque<T>,
}

impl<T> RingBuffer<T> {
    pub fn new(max_buffer_len: usize) -> Self {
        assert!(max_buffer_len > 0);
        Self {
            max_buffer_len,
            buffer: VecDeque::with_capacity(max_buffer_len),
        }
    }

    pub fn len(&self) -> usize { self.buffer.len() }

    pub fn is_empty(&self) -> bool { self.buffer.is_empty() }

    pub fn add(
        &mut self,
        element: T,
    ) {
        if self.buffer.len() == self.max_buffer_len {
            self.buffer.pop_front();
        }
        self.buffer.push_back(element);
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> { self.buffer.iter() }
}

/// Recent episode rewards and actions - used for learning progress statistics only
pub struct EpisodeHistory<A: Action> {
    episode_rewards: RingBuffer<f64>,
    actions: RingBuffer<A>,
}

impl<A: Action> EpisodeHistory<A> {
    pub fn new(
        episode_reward_buffer_len: usize,
        action_buffer_len: usize,
    ) -> Self {
        Self {
            episode_rewards: RingBuffer::new(episode_reward_buffer_len),
            actions: RingBuffer::new(action_buffer_len),
        }
    }

    pub fn add_action(
        &mut self,
        action: A,
    ) {
        self.actions.add(action)
    }

    pub fn add_episode_reward(
        &mut self,
        episode_reward: f64,
    ) {
        self.episode_rewards.add(episode_reward)
    }

    pub fn episode_rewards(&self) -> &RingBuffer<f64> { &self.episode_rewards }

    pub fn actions(&self) -> &RingBuffer<A> { &self.actions }

    pub fn avg_episode_reward(&self) -> f64 {
        assert!(!self.episode_rewards.is_empty());
        self.episode_rewards.iter().sum::<f64>() / self.episode_rewards.len() as f64
    }

    pub fn min_episode_reward(&self) -> f64 {
        self.episode_rewards.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max_episode_reward(&self) -> f64 {
        self.episode_rewards.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Share (in percent) of each action among the recorded actions, ordered by action index
    pub fn action_distribution(&self) -> Vec<(A, f64)> {
        let mut action_counts = FxHashMap::<A, usize>::default();
        for &a in self.actions.iter() {
            action_counts.entry(a).and_modify(|e| *e += 1).or_insert(1);
        }
        let total_actions = self.actions.len();
        action_counts
            .into_iter()
            .sorted_by_key(|(action, _)| action.numeric())
            .map(|(action, count)| (action, 100.0 * count as f64 / total_actions as f64))
            .collect()
    }
}
