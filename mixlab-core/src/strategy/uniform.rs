//! Uniform baseline: `1/K` on every expert, forever.

use super::{Hyperparameters, WeightUpdate};
use crate::domain::uniform;
use crate::error::StepError;
use crate::loss::UpdateLoss;

#[derive(Debug, Clone)]
pub struct Uniform {
    weights: Vec<f64>,
}

impl Uniform {
    pub fn new(experts: usize) -> Self {
        Self {
            weights: uniform(experts),
        }
    }
}

impl WeightUpdate for Uniform {
    fn name(&self) -> &str {
        "uniform"
    }

    fn weights(&self) -> &[f64] {
        &self.weights
    }

    fn hyperparameters(&self) -> Hyperparameters {
        Hyperparameters::default()
    }

    fn update(&mut self, _x: &[f64], _y: f64, _loss: &UpdateLoss) -> Result<(), StepError> {
        Ok(())
    }
}
