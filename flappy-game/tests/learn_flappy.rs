use anyhow::Result;

use flappy_game::flappy_environment::{FlappyAction, FlappyEnvironment};
use flappy_game::GameConfig;
use ql::learn::tabular_q_learner::{Parameter, TabularQLearner};
use ql::model::persistence;
use ql::util::log::init_logging;

fn param(seed: u64) -> Parameter {
    Parameter {
        episodes: 50,
        max_steps_per_episode: 500,
        stats_after_episodes: 25,
        seed: Some(seed),
        ..Parameter::default()
    }
}

fn learner(seed: u64) -> Result<TabularQLearner<FlappyEnvironment>> {
    Ok(TabularQLearner::new(FlappyEnvironment::new(GameConfig::default(), Some(seed))?, param(seed))?)
}

#[test]
fn test_headless_training_run() -> Result<()> {
    init_logging();

    let mut learner = learner(7)?;
    let reports = learner.learn();
    assert_eq!(reports.len(), 50);
    for report in &reports {
        assert!(report.steps >= 1 && report.steps <= 500);
        if report.terminated {
            assert_eq!(report.total_reward, (report.steps - 1) as f64 - 100.0);
        } else {
            assert_eq!(report.total_reward, report.steps as f64);
        }
    }
    assert!(learner.q_table().values().iter().any(|v| *v != 0.0));
    assert!(learner.q_table().values().iter().all(|v| v.is_finite()));
    Ok(())
}

#[test]
fn test_seeded_training_is_reproducible() -> Result<()> {
    let mut a = learner(99)?;
    let mut b = learner(99)?;
    let rewards_a = a.learn().iter().map(|r| r.total_reward).collect::<Vec<_>>();
    let rewards_b = b.learn().iter().map(|r| r.total_reward).collect::<Vec<_>>();
    assert_eq!(rewards_a, rewards_b);
    assert_eq!(a.q_table(), b.q_table());
    Ok(())
}

#[test]
fn test_trained_table_survives_save_and_load() -> Result<()> {
    let mut learner = learner(3)?;
    learner.learn();

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("q_table.msgpack");
    persistence::save_to_file(learner.q_table(), &path)?;
    let loaded = persistence::load_from_file::<FlappyAction>(&path)?;
    assert_eq!(&loaded, learner.q_table());

    let resumed = TabularQLearner::with_q_table(FlappyEnvironment::new(GameConfig::default(), Some(3))?, param(3), loaded);
    assert!(resumed.is_ok());

    // a table trained with another resolution is refused
    let mismatched = Parameter { resolution: 100, ..param(3) };
    let loaded = persistence::load_from_file::<FlappyAction>(&path)?;
    assert!(TabularQLearner::with_q_table(FlappyEnvironment::new(GameConfig::default(), None)?, mismatched, loaded).is_err());
    Ok(())
}
