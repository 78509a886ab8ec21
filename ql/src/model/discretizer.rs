use crate::model::q_table::DiscreteState;
use crate::prelude::Observation;

/// Maps the continuous raw quantities of an [Observation] into table buckets.
///
/// Each quantity is divided by `scale`, floored and then clamped into `[0, resolution - 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Discretizer {
    scale: f64,
    resolution: usize,
}

impl Discretizer {
    pub fn new(
        scale: f64,
        resolution: usize,
    ) -> Self {
        assert!(scale.is_finite() && scale > 0.0, "scale must be positive and finite");
        assert!(resolution > 0, "resolution must be positive");
        Self { scale, resolution }
    }

    pub fn discretize<O: Observation>(
        &self,
        observation: &O,
    ) -> DiscreteState {
        let [horizontal, vertical] = observation.raw_quantities();
        DiscreteState(self.bucket(horizontal), self.bucket(vertical))
    }

    pub fn bucket(
        &self,
        raw: f64,
    ) -> usize {
        let max = self.resolution - 1;
        let scaled = (raw / self.scale).floor();
        if scaled.is_nan() || scaled <= 0.0 {
            0
        } else if scaled >= max as f64 {
            max
        } else {
            scaled as usize
        }
    }
}
