use std::sync::atomic::{AtomicBool, Ordering};

use itertools::Itertools;
use num_format::ToFormattedString;

use crate::learn::episode_history::EpisodeHistory;
use crate::learn::epsilon_greedy::{EpsilonGreedy, ExplorationRate};
use crate::model::discretizer::Discretizer;
use crate::model::q_table::QTable;
use crate::prelude::{DebugVisualizer, Environment, QlError};
use crate::util::format;

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Number of buckets per state dimension (B)
    pub resolution: usize,
    /// Divisor applied to raw observation quantities before bucketing
    pub scale: f64,
    /// Learning rate α
    pub alpha: f64,
    /// Discount rate; (0 <= 𝛾 <= 1) represents the value of future rewards. The bigger, the more farsighted the agent becomes
    pub gamma: f64,
    /// Initial epsilon greedy parameter
    pub epsilon_max: f64,
    /// Minimum epsilon greedy parameter
    pub epsilon_min: f64,
    /// Multiplicative epsilon decay, applied once per episode
    pub epsilon_decay: f64,
    /// Episode budget of [TabularQLearner::learn]
    pub episodes: usize,
    /// Safety cap, so that even a degenerate policy finishes its episode
    pub max_steps_per_episode: usize,
    /// Reward for every non-terminal step
    pub step_reward: f64,
    /// Reward for the terminal step (replaces the step reward)
    pub terminal_penalty: f64,
    /// Number of recent episodes covered by the progress statistics
    pub episode_reward_history_buffer_len: usize,
    /// Number of recent actions covered by the action distribution statistics
    pub action_history_buffer_len: usize,
    /// Log progress statistics every n episodes
    pub stats_after_episodes: usize,
    /// Call [Environment::render] after every step
    pub render: bool,
    /// Seed for the exploration randomness; `None` draws from OS entropy
    pub seed: Option<u64>,
}

impl Parameter {
    pub fn validate(&self) -> Result<(), QlError> {
        let invalid = |msg: String| Err(QlError::InvalidParameter(msg));

        if self.resolution == 0 {
            return invalid("resolution must be positive".to_string());
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return invalid(format!("scale must be positive and finite, got {}", self.scale));
        }
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return invalid(format!("alpha must be within (0, 1], got {}", self.alpha));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return invalid(format!("gamma must be within [0, 1], got {}", self.gamma));
        }
        if !(0.0..=1.0).contains(&self.epsilon_min) || !(self.epsilon_min..=1.0).contains(&self.epsilon_max) {
            return invalid(format!(
                "expected 0 <= epsilon_min <= epsilon_max <= 1, got {} and {}",
                self.epsilon_min, self.epsilon_max
            ));
        }
        if !(0.0..=1.0).contains(&self.epsilon_decay) {
            return invalid(format!("epsilon_decay must be within [0, 1], got {}", self.epsilon_decay));
        }
        if self.max_steps_per_episode == 0
            || self.episode_reward_history_buffer_len == 0
            || self.action_history_buffer_len == 0
            || self.stats_after_episodes == 0
        {
            return invalid("step cap, history lengths and stats interval must be positive".to_string());
        }
        if !(self.step_reward.is_finite() && self.terminal_penalty.is_finite()) {
            return invalid("rewards must be finite".to_string());
        }
        Ok(())
    }
}

impl Default for Parameter {
    fn default() -> Self {
        Self {
            resolution: 500,
            scale: 10.0,
            alpha: 0.1,
            gamma: 0.99,
            epsilon_max: 1.0,
            epsilon_min: 0.01,
            epsilon_decay: 0.995,
            episodes: 1_000,
            max_steps_per_episode: 10_000,
            step_reward: 1.0,
            terminal_penalty: -100.0,
            episode_reward_history_buffer_len: 100,
            action_history_buffer_len: 100_000,
            stats_after_episodes: 100,
            render: false,
            seed: None,
        }
    }
}

/// Outcome of one episode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeReport {
    pub episode: usize,
    pub total_reward: f64,
    pub steps: usize,
    /// `false` when the episode was cut by `max_steps_per_episode`
    pub terminated: bool,
    /// Exploration rate after the end-of-episode decay
    pub epsilon: f64,
}

/**
    A tabular Q learning algorithm.
    It's directly connected to a (Game-) Environment and drives the steps in that environment.

    Per step: choose action (epsilon-greedy) → step the environment → reward → discretize → one-step
    Q-learning update. After each episode the exploration rate decays.
 */
pub struct TabularQLearner<E: Environment> {
    environment: E,
    param: Parameter,
    discretizer: Discretizer,
    q_table: QTable<E::A>,
    policy: EpsilonGreedy,
    exploration: ExplorationRate,
    history: EpisodeHistory<E::A>,
    step_count: usize,
    episode_count: usize,
}

impl<E: Environment> TabularQLearner<E> {
    pub fn new(
        environment: E,
        param: Parameter,
    ) -> Result<Self, QlError> {
        param.validate()?;
        let q_table = QTable::new(param.resolution);
        Ok(Self::assemble(environment, param, q_table))
    }

    /// Continue learning from a previously saved table
    pub fn with_q_table(
        environment: E,
        param: Parameter,
        q_table: QTable<E::A>,
    ) -> Result<Self, QlError> {
        param.validate()?;
        if q_table.resolution() != param.resolution {
            return Err(QlError::ResolutionMismatch {
                table: q_table.resolution(),
                configured: param.resolution,
            });
        }
        Ok(Self::assemble(environment, param, q_table))
    }

    fn assemble(
        environment: E,
        param: Parameter,
        q_table: QTable<E::A>,
    ) -> Self {
        Self {
            environment,
            discretizer: Discretizer::new(param.scale, param.resolution),
            q_table,
            policy: EpsilonGreedy::new(param.seed),
            exploration: ExplorationRate::new(param.epsilon_max, param.epsilon_decay, param.epsilon_min),
            history: EpisodeHistory::new(param.episode_reward_history_buffer_len, param.action_history_buffer_len),
            step_count: 0,
            episode_count: 0,
            param,
        }
    }

    pub fn param(&self) -> &Parameter { &self.param }

    pub fn q_table(&self) -> &QTable<E::A> { &self.q_table }

    pub fn into_q_table(self) -> QTable<E::A> { self.q_table }

    pub fn environment(&self) -> &E { &self.environment }

    pub fn exploration_rate(&self) -> f64 { self.exploration.value() }

    pub fn episode_count(&self) -> usize { self.episode_count }

    pub fn step_count(&self) -> usize { self.step_count }

    /// Runs the configured episode budget
    pub fn learn(&mut self) -> Vec<EpisodeReport> { self.learn_until_stopped(&AtomicBool::new(false)) }

    /// Runs the configured episode budget, but stops early once `stop_signal` is raised.
    /// The signal is only looked at between episodes.
    pub fn learn_until_stopped(
        &mut self,
        stop_signal: &AtomicBool,
    ) -> Vec<EpisodeReport> {
        let mut reports = Vec::with_capacity(self.param.episodes);
        for _ in 0..self.param.episodes {
            if stop_signal.load(Ordering::Relaxed) {
                log::info!("learning stopped after {} episodes", self.episode_count);
                break;
            }
            reports.push(self.learn_episode());
        }
        reports
    }

    pub fn learn_episode(&mut self) -> EpisodeReport {
        let mut state = self.discretizer.discretize(self.environment.reset());
        log::trace!("started learning episode {}", self.episode_count);

        let mut episode_reward = 0.0;
        let mut steps = 0;
        let mut terminated = false;

        while steps < self.param.max_steps_per_episode {
            steps += 1;
            self.step_count += 1;

            let action = self.policy.choose(&self.q_table, state, self.exploration.value());

            let (observation, done) = self.environment.step(action);
            let next_state = self.discretizer.discretize(observation);
            // the terminal step earns the penalty only
            let reward = if done { self.param.terminal_penalty } else { self.param.step_reward };
            log::trace!("step with action {} resulted in reward: {:.1}, done: {}", action, reward, done);

            self.q_table
                .q_learning_update(state, action, reward, next_state, self.param.alpha, self.param.gamma);

            if self.param.render {
                self.environment.render(self.environment.observation());
            }

            self.history.add_action(action);
            state = next_state;
            episode_reward += reward;

            if done {
                terminated = true;
                break;
            }
        }

        if !terminated {
            log::debug!("episode {} reached the step limit of {}", self.episode_count, self.param.max_steps_per_episode);
        }

        let epsilon = self.exploration.decay();
        self.history.add_episode_reward(episode_reward);
        let report = EpisodeReport {
            episode: self.episode_count,
            total_reward: episode_reward,
            steps,
            terminated,
            epsilon,
        };

        log::info!("episode: {}, total reward: {}", report.episode, report.total_reward);
        log::debug!("{}", self.environment.observation().one_line_info());

        self.episode_count += 1;
        if self.episode_count % self.param.stats_after_episodes == 0 {
            self.learning_update_log();
        }

        report
    }

    /// Plays one episode greedily with the current table - no exploration, no learning
    pub fn play_episode(&mut self) -> EpisodeReport {
        let mut state = self.discretizer.discretize(self.environment.reset());
        if self.param.render {
            self.environment.render(self.environment.observation());
        }

        let mut total_reward = 0.0;
        let mut steps = 0;
        let mut terminated = false;

        while steps < self.param.max_steps_per_episode {
            steps += 1;
            let action = self.q_table.best_action(state);
            let (observation, done) = self.environment.step(action);
            state = self.discretizer.discretize(observation);
            total_reward += if done { self.param.terminal_penalty } else { self.param.step_reward };

            if self.param.render {
                self.environment.render(self.environment.observation());
            }
            if done {
                terminated = true;
                break;
            }
        }

        log::info!("greedy play: {} steps, total reward: {}", steps, total_reward);
        log::debug!("{}", self.environment.observation().one_line_info());

        EpisodeReport {
            episode: self.episode_count,
            total_reward,
            steps,
            terminated,
            epsilon: 0.0,
        }
    }

    fn learning_update_log(&self) {
        let number_format = format::number_format();

        let action_distribution_line = self
            .history
            .action_distribution()
            .iter()
            .map(|(action, ratio)| format!("{} {:.1}%", action, ratio))
            .join(", ");

        log::info!(
            "\n\
    episode: {}, steps: {}, 𝛼={:.2}, 𝛾={:.2}, 𝜀={:.3}\n\
    rewards (of last {} episodes): {{mean: {:.1}, low: {:.1}, high: {:.1}}}\n\
    action_distribution (of last {}): {}",
            self.episode_count.to_formatted_string(&number_format),
            self.step_count.to_formatted_string(&number_format),
            self.param.alpha,
            self.param.gamma,
            self.exploration.value(),
            self.history.episode_rewards().len(),
            self.history.avg_episode_reward(),
            self.history.min_episode_reward(),
            self.history.max_episode_reward(),
            self.history.actions().len().to_formatted_string(&number_format),
            action_distribution_line
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use std::cell::Cell;
    use std::rc::Rc;

    use crate::model::q_table::DiscreteState;
    use crate::test::hover_test_environment::{HoverAction, HoverState, HoverTestEnvironment};

    use super::*;

    /// Hover environment which counts its render calls instead of drawing
    struct CountingRenderEnvironment {
        inner: HoverTestEnvironment,
        renders: Rc<Cell<usize>>,
    }

    impl Environment for CountingRenderEnvironment {
        type S = HoverState;
        type A = HoverAction;

        fn reset(&mut self) -> &Self::S { self.inner.reset() }

        fn observation(&self) -> &Self::S { self.inner.observation() }

        fn step(
            &mut self,
            action: Self::A,
        ) -> (&Self::S, bool) {
            self.inner.step(action)
        }

        fn render(&self, _observation: &Self::S) { self.renders.set(self.renders.get() + 1); }
    }

    fn test_param() -> Parameter {
        Parameter {
            resolution: 20,
            episodes: 50,
            max_steps_per_episode: 500,
            stats_after_episodes: 10,
            seed: Some(4711),
            ..Parameter::default()
        }
    }

    #[test]
    fn test_learner_single_episode() {
        let mut learner = TabularQLearner::new(HoverTestEnvironment::new(), test_param()).unwrap();
        let report = learner.learn_episode();

        assert_eq!(report.episode, 0);
        assert!(report.steps >= 1);
        assert_eq!(learner.step_count(), report.steps);
        assert_eq!(learner.episode_count(), 1);
        assert!(report.terminated);
        assert_eq!(report.epsilon, 0.995);
        assert_eq!(learner.exploration_rate(), 0.995);
        assert!(learner.q_table().values().iter().any(|&v| v != 0.0));
    }

    #[test]
    fn test_terminal_step_earns_penalty_exclusively() {
        let mut learner = TabularQLearner::new(HoverTestEnvironment::new(), test_param()).unwrap();
        for _ in 0..20 {
            let report = learner.learn_episode();
            assert!(report.terminated);
            assert_eq!(report.total_reward, (report.steps - 1) as f64 - 100.0);
        }
    }

    #[test]
    fn test_learning_is_deterministic_for_a_fixed_seed() {
        let run = || {
            let mut learner = TabularQLearner::new(HoverTestEnvironment::new(), test_param()).unwrap();
            let reports = learner.learn();
            (reports, learner.into_q_table())
        };
        let (reports_a, table_a) = run();
        let (reports_b, table_b) = run();

        assert_eq!(reports_a, reports_b);
        assert_eq!(reports_a.len(), 50);
        assert!(table_a
            .values()
            .iter()
            .zip(table_b.values())
            .all(|(a, b)| a.to_bits() == b.to_bits()));
    }

    #[test]
    fn test_rendering_does_not_change_learning() {
        let run = |render: bool| {
            let renders = Rc::new(Cell::new(0));
            let env = CountingRenderEnvironment {
                inner: HoverTestEnvironment::new(),
                renders: Rc::clone(&renders),
            };
            let mut learner = TabularQLearner::new(env, Parameter { render, ..test_param() }).unwrap();
            let reports = learner.learn();
            (reports, learner.into_q_table(), renders.get())
        };
        let (reports_plain, table_plain, renders_plain) = run(false);
        let (reports_rendered, table_rendered, renders_rendered) = run(true);

        assert_eq!(renders_plain, 0);
        assert_eq!(renders_rendered, reports_rendered.iter().map(|r| r.steps).sum::<usize>());
        assert_eq!(reports_plain, reports_rendered);
        assert!(table_plain
            .values()
            .iter()
            .zip(table_rendered.values())
            .all(|(a, b)| a.to_bits() == b.to_bits()));
    }

    #[test]
    fn test_exploration_rate_decays_per_episode() {
        let mut learner = TabularQLearner::new(HoverTestEnvironment::new(), Parameter {
            episodes: 1_000,
            ..test_param()
        })
        .unwrap();
        let reports = learner.learn();

        let mut last = 1.0;
        for report in &reports {
            assert!(report.epsilon <= last);
            assert!(report.epsilon >= 0.01);
            last = report.epsilon;
        }
        assert_eq!(last, 0.01);
    }

    #[test]
    fn test_step_cap_ends_a_never_ending_episode() {
        let mut learner = TabularQLearner::new(HoverTestEnvironment::without_walls(), Parameter {
            max_steps_per_episode: 42,
            ..test_param()
        })
        .unwrap();
        let report = learner.learn_episode();
        assert!(!report.terminated);
        assert_eq!(report.steps, 42);
        assert_eq!(report.total_reward, 42.0);
    }

    #[test]
    fn test_stop_signal_is_honored_between_episodes() {
        let mut learner = TabularQLearner::new(HoverTestEnvironment::new(), test_param()).unwrap();
        let stop_signal = AtomicBool::new(true);
        assert!(learner.learn_until_stopped(&stop_signal).is_empty());
        assert_eq!(learner.episode_count(), 0);
    }

    #[test]
    fn test_greedy_play_does_not_touch_the_table() {
        let mut learner = TabularQLearner::new(HoverTestEnvironment::without_walls(), Parameter {
            max_steps_per_episode: 30,
            ..test_param()
        })
        .unwrap();
        learner.learn_episode();
        let before = learner.q_table().clone();
        let epsilon = learner.exploration_rate();

        let report = learner.play_episode();
        assert_eq!(report.steps, 30);
        assert_eq!(learner.q_table(), &before);
        assert_eq!(learner.exploration_rate(), epsilon);
    }

    #[test]
    fn test_with_q_table_checks_resolution() {
        let table = QTable::<HoverAction>::new(10);
        let result = TabularQLearner::with_q_table(HoverTestEnvironment::new(), test_param(), table);
        assert!(matches!(result, Err(QlError::ResolutionMismatch {
            table: 10,
            configured: 20
        })));

        let mut table = QTable::<HoverAction>::new(20);
        table.update(DiscreteState(0, 5), HoverAction::Lift, 3.0);
        let learner = TabularQLearner::with_q_table(HoverTestEnvironment::new(), test_param(), table.clone()).unwrap();
        assert_eq!(learner.q_table(), &table);
    }

    #[test]
    fn test_invalid_parameter_is_rejected() {
        for param in [
            Parameter { alpha: 0.0, ..test_param() },
            Parameter { gamma: 1.5, ..test_param() },
            Parameter { resolution: 0, ..test_param() },
            Parameter { scale: f64::NAN, ..test_param() },
            Parameter {
                epsilon_min: 0.5,
                epsilon_max: 0.2,
                ..test_param()
            },
        ] {
            assert!(matches!(
                TabularQLearner::new(HoverTestEnvironment::new(), param),
                Err(QlError::InvalidParameter(_))
            ));
        }
    }
}
