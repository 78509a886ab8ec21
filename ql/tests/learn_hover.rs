use anyhow::Result;

use ql::learn::tabular_q_learner::{Parameter, TabularQLearner};
use ql::model::persistence;
use ql::test::hover_test_environment::{HoverAction, HoverTestEnvironment};
use ql::util::log::init_logging;

fn param() -> Parameter {
    Parameter {
        resolution: 16,
        episodes: 300,
        max_steps_per_episode: 200,
        stats_after_episodes: 100,
        seed: Some(2024),
        ..Parameter::default()
    }
}

#[test]
fn test_learn_save_and_replay() -> Result<()> {
    init_logging();

    let mut learner = TabularQLearner::new(HoverTestEnvironment::new(), param())?;
    let reports = learner.learn();
    assert_eq!(reports.len(), 300);
    assert_eq!(learner.episode_count(), 300);
    assert!(reports.iter().all(|r| r.steps <= 200));

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("hover_q_table.msgpack");
    persistence::save_to_file(learner.q_table(), &path)?;
    let loaded = persistence::load_from_file::<HoverAction>(&path)?;
    assert_eq!(&loaded, learner.q_table());

    // a reloaded table replays exactly the same greedy episode
    let expected = learner.play_episode();
    let mut replayer = TabularQLearner::with_q_table(HoverTestEnvironment::new(), param(), loaded)?;
    let replayed = replayer.play_episode();
    assert_eq!(replayed.steps, expected.steps);
    assert_eq!(replayed.total_reward, expected.total_reward);
    assert_eq!(replayed.terminated, expected.terminated);

    Ok(())
}

#[test]
fn test_resumed_learning_continues_from_saved_table() -> Result<()> {
    init_logging();

    let mut first = TabularQLearner::new(HoverTestEnvironment::new(), param())?;
    first.learn();
    let bytes = persistence::to_bytes(first.q_table())?;

    let resumed_table = persistence::from_bytes::<HoverAction>(&bytes)?;
    let mut resumed = TabularQLearner::with_q_table(HoverTestEnvironment::new(), param(), resumed_table)?;
    assert_eq!(resumed.q_table(), first.q_table());
    assert_eq!(resumed.exploration_rate(), 1.0);

    resumed.learn_episode();
    assert_ne!(resumed.q_table(), first.q_table());

    Ok(())
}
