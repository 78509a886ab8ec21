use std::fmt::{Debug, Display};
use std::hash::Hash;

use anyhow::Result;
use console_engine::screen::Screen;
use thiserror::Error;

/// Data type we use to encode an `Action` as an index into the Q-table.
pub type ModelActionType = u8;

pub trait Action: Display + Debug + Sized + Clone + Copy + Hash + PartialEq + Eq {
    /// Number of possible actions
    const ACTION_SPACE: ModelActionType;
    /// Identifying the Action as a unique value in range (0..Self::ACTION_SPACE)
    fn numeric(&self) -> ModelActionType;
    fn try_from_numeric(value: ModelActionType) -> Result<Self>;

    /// Like [Self::try_from_numeric], but an index outside of the action space is treated as a programming defect.
    fn from_numeric(value: ModelActionType) -> Self {
        match Self::try_from_numeric(value) {
            Ok(action) => action,
            Err(e) => panic!("invalid action index {} (action space: {}): {}", value, Self::ACTION_SPACE, e),
        }
    }
}

/// The part of an environment state the learning agent looks at.
pub trait Observation {
    /// The two signed raw quantities which get bucketed into a [crate::model::q_table::DiscreteState]
    fn raw_quantities(&self) -> [f64; 2];
}

/// Learning environment, modeling the world of a learning agent
///
/// The agent never reaches into the environment's entities - it only resets, steps and observes.
pub trait Environment {
    /// Observation snapshot, produced once per tick
    type S: Observation + DebugVisualizer + Clone;
    type A: Action;

    /// Resets the environment to its canonical starting point
    fn reset(&mut self) -> &Self::S;

    /// Current observation
    fn observation(&self) -> &Self::S;

    /// Performs one time/action-step.
    ///
    /// Applies the given `action` to the environment and returns:
    ///   - next observation
    ///   - terminal flag (e.g. collision)
    ///
    fn step(
        &mut self,
        action: Self::A,
    ) -> (&Self::S, bool);

    /// Optional visualization hook - called once per tick when rendering is switched on
    fn render(&self, _observation: &Self::S) {}
}

pub trait DebugVisualizer {
    fn one_line_info(&self) -> String;
    fn render_to_console(&self) -> Screen;
}

#[derive(Debug, Error)]
pub enum QlError {
    #[error("q-table format error: {0}")]
    Format(String),

    #[error("failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("q-table resolution {table} does not match the configured resolution {configured}")]
    ResolutionMismatch { table: usize, configured: usize },
}
