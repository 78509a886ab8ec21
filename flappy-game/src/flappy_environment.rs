use std::fmt::{Display, Formatter};

use anyhow::{anyhow, Result};
use console_engine::pixel;
use console_engine::screen::Screen;

use ql::prelude::{Action, DebugVisualizer, Environment, ModelActionType, Observation};

use crate::mechanics::{Bird, FlappyMechanics, GameConfig, Pipe};

/// Screen pixels per console character cell
const CELL_SIZE: i32 = 20;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum FlappyAction {
    Noop,
    Flap,
}

impl Display for FlappyAction {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl Action for FlappyAction {
    const ACTION_SPACE: ModelActionType = 2;

    fn numeric(&self) -> ModelActionType {
        match self {
            FlappyAction::Noop => 0,
            FlappyAction::Flap => 1,
        }
    }

    fn try_from_numeric(value: ModelActionType) -> Result<Self> {
        match value {
            0 => Ok(FlappyAction::Noop),
            1 => Ok(FlappyAction::Flap),
            _ => Err(anyhow!("value {} out of range", value)),
        }
    }
}

/// Snapshot of the game world after a tick
#[derive(Debug, Clone, PartialEq)]
pub struct FlappyObservation {
    config: GameConfig,
    bird: Bird,
    pipes: Vec<Pipe>,
    next_pipe: Option<Pipe>,
    score: u32,
}

impl FlappyObservation {
    fn capture(mechanics: &FlappyMechanics) -> Self {
        Self {
            config: *mechanics.config(),
            bird: *mechanics.bird(),
            pipes: mechanics.pipes().to_vec(),
            next_pipe: mechanics.next_pipe().copied(),
            score: mechanics.score(),
        }
    }

    pub fn bird_y(&self) -> i32 { self.bird.y }

    pub fn bird_velocity(&self) -> i32 { self.bird.velocity }

    pub fn score(&self) -> u32 { self.score }

    /// Horizontal distance from the bird to the next pipe; `None` with an empty pipe field
    pub fn distance_to_pipe(&self) -> Option<i32> { self.next_pipe.map(|p| p.x - self.bird.x) }

    /// Vertical offset from the bird to the centre of the next pipe's gap (positive: bird is above it)
    pub fn gap_offset(&self) -> Option<i32> { self.next_pipe.map(|p| p.gap_center(&self.config) - self.bird.y) }
}

impl Observation for FlappyObservation {
    fn raw_quantities(&self) -> [f64; 2] {
        match (self.distance_to_pipe(), self.gap_offset()) {
            (Some(distance), Some(offset)) => [distance as f64, offset as f64],
            // nothing ahead: as far away as it gets
            _ => [f64::INFINITY, 0.0],
        }
    }
}

impl DebugVisualizer for FlappyObservation {
    fn one_line_info(&self) -> String {
        format!(
            "FlappyObservation: score: {}, bird: {{y: {}, v: {}}}, next pipe: {{dx: {}, dy: {}}}",
            self.score,
            self.bird.y,
            self.bird.velocity,
            self.distance_to_pipe().map_or("-".to_string(), |d| d.to_string()),
            self.gap_offset().map_or("-".to_string(), |d| d.to_string()),
        )
    }

    fn render_to_console(&self) -> Screen {
        let width = self.config.screen_width / CELL_SIZE;
        let height = self.config.screen_height / CELL_SIZE;
        let mut screen = Screen::new_fill(width as u32, height as u32, pixel::pxl(' '));

        for pipe in &self.pipes {
            let from = (pipe.x / CELL_SIZE).max(0);
            let to = ((pipe.x + self.config.pipe_width) / CELL_SIZE).min(width - 1);
            for column in from..=to {
                for row in 0..height {
                    let y = row * CELL_SIZE;
                    if y < pipe.height || y > pipe.height + self.config.pipe_gap {
                        screen.set_pxl(column, row, pixel::pxl('█'));
                    }
                }
            }
        }

        let bird_row = self.bird.y / CELL_SIZE;
        if (0..height).contains(&bird_row) {
            screen.set_pxl(self.bird.x / CELL_SIZE, bird_row, pixel::pxl('●'));
        }
        screen.print(0, 0, &format!("{}", self.score));
        screen
    }
}

/// The flap game as a learning environment
pub struct FlappyEnvironment {
    mechanics: FlappyMechanics,
    observation: FlappyObservation,
}

impl FlappyEnvironment {
    pub fn new(
        config: GameConfig,
        seed: Option<u64>,
    ) -> Result<Self> {
        let mechanics = FlappyMechanics::new(config, seed)?;
        let observation = FlappyObservation::capture(&mechanics);
        Ok(Self { mechanics, observation })
    }

    pub fn mechanics(&self) -> &FlappyMechanics { &self.mechanics }
}

impl Environment for FlappyEnvironment {
    type S = FlappyObservation;
    type A = FlappyAction;

    fn reset(&mut self) -> &Self::S {
        self.mechanics.reset();
        self.observation = FlappyObservation::capture(&self.mechanics);
        &self.observation
    }

    fn observation(&self) -> &Self::S { &self.observation }

    fn step(
        &mut self,
        action: Self::A,
    ) -> (&Self::S, bool) {
        self.mechanics.time_step(action == FlappyAction::Flap);
        self.observation = FlappyObservation::capture(&self.mechanics);
        (&self.observation, self.mechanics.collision())
    }

    fn render(
        &self,
        observation: &Self::S,
    ) {
        observation.render_to_console().draw();
        println!("\n-----");
    }
}
