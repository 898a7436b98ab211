//! Exponentially weighted average forecaster.
//!
//! `p_k ∝ exp(-eta * L_k)` where `L_k` is expert k's cumulative update loss
//! (raw, or linearized at the aggregate prediction with the gradient trick).
//! Only the cumulative losses are state, so the same history can be replayed
//! under any other learning rate.

use super::{Hyperparameters, WeightUpdate};
use crate::domain::weights::exponential_weights;
use crate::domain::{dot, uniform};
use crate::error::StepError;
use crate::loss::UpdateLoss;

#[derive(Debug, Clone)]
pub struct Ewa {
    eta: f64,
    cumulative: Vec<f64>,
    weights: Vec<f64>,
}

impl Ewa {
    pub fn new(experts: usize, eta: f64) -> Self {
        Self {
            eta,
            cumulative: vec![0.0; experts],
            weights: uniform(experts),
        }
    }

    pub fn eta(&self) -> f64 {
        self.eta
    }

    pub fn cumulative_loss(&self) -> &[f64] {
        &self.cumulative
    }

    pub fn with_eta(&self, eta: f64) -> Self {
        Self {
            eta,
            cumulative: self.cumulative.clone(),
            weights: exponential_weights(&self.cumulative, eta),
        }
    }
}

impl WeightUpdate for Ewa {
    fn name(&self) -> &str {
        "ewa"
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
        let terms = loss.expert_terms(x, y, prediction)?;
        for (l, t) in self.cumulative.iter_mut().zip(terms) {
            *l += t;
        }
        self.weights = exponential_weights(&self.cumulative, self.eta);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loss::LossFunction;

    fn raw_square() -> UpdateLoss {
        UpdateLoss::new(LossFunction::square(), false)
    }

    #[test]
    fn weight_moves_to_correct_expert() {
        let loss = raw_square();
        let mut s = Ewa::new(2, 1.0);
        let mut last = s.weights()[1];
        for _ in 0..4 {
            s.update(&[0.0, 1.0], 1.0, &loss).unwrap();
            assert!(s.weights()[1] > last);
            last = s.weights()[1];
        }
        // 1 / (1 + e^-4)
        assert!((last - 0.982_013_790_037_908_4).abs() < 1e-12);
    }

    #[test]
    fn zero_rate_stays_uniform() {
        let loss = raw_square();
        let mut s = Ewa::new(3, 0.0);
        for t in 0..10 {
            s.update(&[t as f64, 0.0, -1.0], 2.0, &loss).unwrap();
            assert_eq!(s.weights(), &[1.0 / 3.0; 3]);
        }
    }

    #[test]
    fn infinite_rate_follows_the_leader() {
        let loss = raw_square();
        let mut s = Ewa::new(3, f64::INFINITY);
        s.update(&[0.0, 2.0, 2.0], 2.0, &loss).unwrap();
        assert_eq!(s.weights(), &[0.0, 1.0, 0.0]);
    }

    #[test]
    fn gradient_trick_uses_linearized_losses() {
        let loss = UpdateLoss::new(LossFunction::square(), true);
        let mut s = Ewa::new(2, 1.0);
        s.update(&[0.0, 1.0], 1.0, &loss).unwrap();
        // g = 2 (0.5 - 1) = -1, so L = [0, -1].
        assert_eq!(s.cumulative_loss(), &[0.0, -1.0]);
        assert!((s.weights()[1] - 1.0 / (1.0 + (-1.0f64).exp())).abs() < 1e-12);
    }
}
