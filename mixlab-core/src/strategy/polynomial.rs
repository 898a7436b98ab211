//! Parameter-free polynomially weighted average forecaster.
//!
//! Cumulative regret `R_k = Σ_s (ℓ(ŷ_s) - ℓ(x_{k,s}))`. Weights are the
//! normalized gradient of the potential `Φ(R) = (Σ_k (R_k)_+^p)^{2/p}`, i.e.
//! `p_k ∝ (R_k)_+^{p-1}`, with `p = max(2, 2 ln K)`. With that exponent the
//! regret against the best expert is `O(B sqrt(T ln K))` for losses bounded by
//! `B` (Cesa-Bianchi & Lugosi, Prediction, Learning, and Games, Cor. 2.1),
//! with no learning rate to tune. When no regret is positive the weights are
//! uniform.

use super::{Hyperparameters, WeightUpdate};
use crate::domain::{dot, uniform};
use crate::error::StepError;
use crate::loss::UpdateLoss;

#[derive(Debug, Clone)]
pub struct Polynomial {
    regret: Vec<f64>,
    exponent: f64,
    weights: Vec<f64>,
}

impl Polynomial {
    pub fn new(experts: usize) -> Self {
        Self {
            regret: vec![0.0; experts],
            exponent: exponent_for(experts),
            weights: uniform(experts),
        }
    }

    pub fn regret(&self) -> &[f64] {
        &self.regret
    }

    pub fn exponent(&self) -> f64 {
        self.exponent
    }

    /// Add an expert that joins with zero regret.
    pub fn push_expert(&mut self) {
        self.regret.push(0.0);
        self.exponent = exponent_for(self.regret.len());
        self.weights = potential_weights(&self.regret, self.exponent);
    }
}

fn exponent_for(experts: usize) -> f64 {
    (2.0 * (experts.max(1) as f64).ln()).max(2.0)
}

fn potential_weights(regret: &[f64], exponent: f64) -> Vec<f64> {
    let max = regret.iter().copied().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return uniform(regret.len());
    }
    // Scale by the largest regret first so large regrets cannot overflow.
    let raw: Vec<f64> = regret
        .iter()
        .map(|&r| (r.max(0.0) / max).powf(exponent - 1.0))
        .collect();
    let sum: f64 = raw.iter().sum();
    raw.into_iter().map(|v| v / sum).collect()
}

impl WeightUpdate for Polynomial {
    fn name(&self) -> &str {
        "polynomial"
    }

    fn weights(&self) -> &[f64] {
        &self.weights
    }

    fn hyperparameters(&self) -> Hyperparameters {
        Hyperparameters::default()
    }

    fn update(&mut self, x: &[f64], y: f64, loss: &UpdateLoss) -> Result<(), StepError> {
        let prediction = dot(&self.weights, x);
        let own = loss.forecaster_term(y, prediction)?;
        let terms = loss.expert_terms(x, y, prediction)?;
        for (r, t) in self.regret.iter_mut().zip(terms) {
            *r += own - t;
        }
        self.weights = potential_weights(&self.regret, self.exponent);
        Ok(())
    }
}
