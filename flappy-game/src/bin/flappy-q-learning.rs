use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use flappy_game::flappy_environment::{FlappyAction, FlappyEnvironment};
use flappy_game::GameConfig;
use ql::learn::tabular_q_learner::{Parameter, TabularQLearner};
use ql::model::persistence;
use ql::prelude::Environment;
use ql::util::log::init_logging;

/// Trains a tabular Q-learning agent on the flap game and saves the learned table
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Number of training episodes
    #[arg(long, default_value_t = 1000)]
    episodes: usize,

    /// Where to save the learned table
    #[arg(long, default_value = "q_table.msgpack")]
    output: PathBuf,

    /// Resume from a previously saved table
    #[arg(long)]
    load: Option<PathBuf>,

    /// Seed for exploration and pipe generation
    #[arg(long)]
    seed: Option<u64>,

    /// Step cap per episode
    #[arg(long, default_value_t = 10_000)]
    max_steps: usize,

    /// Draw every training tick to the console
    #[arg(long)]
    render: bool,

    /// After training, play and draw one greedy episode
    #[arg(long)]
    replay: bool,
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let param = Parameter {
        episodes: args.episodes,
        max_steps_per_episode: args.max_steps,
        render: args.render,
        seed: args.seed,
        ..Parameter::default()
    };
    let environment = FlappyEnvironment::new(GameConfig::default(), args.seed)?;

    let mut learner = match &args.load {
        Some(path) => {
            log::info!("resuming from {}", path.display());
            let q_table = persistence::load_from_file::<FlappyAction>(path)?;
            TabularQLearner::with_q_table(environment, param, q_table)?
        }
        None => TabularQLearner::new(environment, param)?,
    };

    let reports = learner.learn();
    let best = reports.iter().map(|r| r.total_reward).fold(f64::NEG_INFINITY, f64::max);
    log::info!("trained {} episodes ({} steps), best episode reward: {}", reports.len(), learner.step_count(), best);

    persistence::save_to_file(learner.q_table(), &args.output)?;
    log::info!("saved table to {}", args.output.display());

    if args.replay {
        let q_table = learner.into_q_table();
        let param = Parameter {
            max_steps_per_episode: args.max_steps,
            render: true,
            seed: args.seed,
            ..Parameter::default()
        };
        let mut player = TabularQLearner::with_q_table(FlappyEnvironment::new(GameConfig::default(), args.seed)?, param, q_table)?;
        let report = player.play_episode();
        log::info!(
            "replay: {} steps, score {}, total reward {}",
            report.steps,
            player.environment().observation().score(),
            report.total_reward
        );
    }

    Ok(())
}
