//! Projected online gradient descent (Zinkevich).
//!
//! `w_t = Project(w_{t-1} - eta_t * ℓ'(ŷ_t, y_t) * x_t)`, with `eta_t` constant
//! or `eta / sqrt(t)`, projected onto the simplex, a centered ball, or left
//! unconstrained.

use super::{Hyperparameters, WeightUpdate};
use crate::config::{Constraint, StepSchedule};
use crate::domain::weights::{project_ball, project_simplex};
use crate::domain::{dot, uniform};
use crate::error::StepError;
use crate::loss::UpdateLoss;

#[derive(Debug, Clone)]
pub struct OnlineGradient {
    eta: f64,
    schedule: StepSchedule,
    constraint: Constraint,
    steps: u64,
    weights: Vec<f64>,
}

impl OnlineGradient {
    pub fn new(experts: usize, eta: f64, schedule: StepSchedule, constraint: Constraint) -> Self {
        Self {
            eta,
            schedule,
            constraint,
            steps: 0,
            weights: project(&uniform(experts), constraint),
        }
    }

    pub fn eta(&self) -> f64 {
        self.eta
    }

    pub fn with_eta(&self, eta: f64) -> Self {
        Self {
            eta,
            ..self.clone()
        }
    }

    fn step_size(&self) -> f64 {
        match self.schedule {
            StepSchedule::Constant => self.eta,
            StepSchedule::InverseSqrt => self.eta / (self.steps as f64).sqrt(),
        }
    }
}

fn project(w: &[f64], constraint: Constraint) -> Vec<f64> {
    match constraint {
        Constraint::Simplex => project_simplex(w),
        Constraint::Ball { radius } => project_ball(w, radius),
        Constraint::Unconstrained => w.to_vec(),
    }
}

impl WeightUpdate for OnlineGradient {
    fn name(&self) -> &str {
        "online_gradient"
    }

    fn weights(&self) -> &[f64] {
        &self.weights
    }

    fn hyperparameters(&self) -> Hyperparameters {
        Hyperparameters {
            eta: Some(self.eta),
            ..Default::default()
        }
    }

    fn update(&mut self, x: &[f64], y: f64, loss: &UpdateLoss) -> Result<(), StepError> {
        let prediction = dot(&self.weights, x);
        let g = loss.function.gradient(y, prediction)?;
        self.steps += 1;
        let step = self.step_size();
        let moved: Vec<f64> = self
            .weights
            .iter()
            .zip(x)
            .map(|(w, xk)| w - step * g * xk)
            .collect();
        self.weights = project(&moved, self.constraint);
        Ok(())
    }
}
