pub mod episode_history;
pub mod epsilon_greedy;
pub mod tabular_q_learner;
