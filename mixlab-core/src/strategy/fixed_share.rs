//! Fixed-share forecaster (Herbster & Warmuth).
//!
//! `p_t = (1 - alpha) * EWA-update(p_{t-1}) + alpha / K`. The uniform share
//! keeps a floor under every expert so the mixture can move to a new leader.

use super::{Hyperparameters, WeightUpdate};
use crate::domain::weights::normalize;
use crate::domain::{dot, uniform};
use crate::error::StepError;
use crate::loss::UpdateLoss;

#[derive(Debug, Clone)]
pub struct FixedShare {
    eta: f64,
    alpha: f64,
    weights: Vec<f64>,
}

impl FixedShare {
    pub fn new(experts: usize, eta: f64, alpha: f64) -> Self {
        Self {
            eta,
            alpha,
            weights: uniform(experts),
        }
    }

    pub fn eta(&self) -> f64 {
        self.eta
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn with_params(&self, eta: f64, alpha: f64) -> Self {
        Self {
            eta,
            alpha,
            weights: self.weights.clone(),
        }
    }
}

impl WeightUpdate for FixedShare {
    fn name(&self) -> &str {
        "fixed_share"
    }

    fn weights(&self) -> &[f64] {
        &self.weights
    }

    fn hyperparameters(&self) -> Hyperparameters {
        Hyperparameters {
            eta: Some(self.eta),
            alpha: Some(self.alpha),
            lambda: None,
        }
    }

    fn update(&mut self, x: &[f64], y: f64, loss: &UpdateLoss) -> Result<(), StepError> {
        let prediction = dot(&self.weights, x);
        let terms = loss.expert_terms(x, y, prediction)?;

        // Log domain: a tiny weight times a huge factor must not overflow.
        let logs: Vec<f64> = self
            .weights
            .iter()
            .zip(&terms)
            .map(|(p, l)| p.ln() - self.eta * l)
            .collect();
        let max = logs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let posterior = normalize(logs.iter().map(|v| (v - max).exp()).collect());

        let k = self.weights.len() as f64;
        self.weights = posterior
            .into_iter()
            .map(|v| (1.0 - self.alpha) * v + self.alpha / k)
            .collect();
        Ok(())
    }
}
