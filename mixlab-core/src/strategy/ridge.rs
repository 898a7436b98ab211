//! Online ridge regression on the expert forecasts.
//!
//! Minimizes `lambda * |w - w0|^2 + Σ_s (y_s - w·x_s)^2` after every round.
//! The inverse `P = (lambda I + XᵀX)^-1` is maintained by Sherman–Morrison
//! rank-one updates. The raw Gram matrix and `Xᵀy` are kept alongside so the
//! same history can be re-solved under another `lambda`.
//!
//! With `lambda = 0` the weights stay at `w0` until `XᵀX` is positive
//! definite; it is then inverted once and updated incrementally afterwards.

use nalgebra::{DMatrix, DVector};

use super::{Hyperparameters, WeightUpdate};
use crate::config::RidgeCenter;
use crate::domain::uniform;
use crate::error::{NumericalError, StepError};
use crate::loss::UpdateLoss;

#[derive(Debug, Clone)]
pub struct Ridge {
    lambda: f64,
    prior: DVector<f64>,
    gram: DMatrix<f64>,
    xty: DVector<f64>,
    /// `(lambda I + XᵀX)^-1`; `None` while an unregularized Gram is singular.
    inverse: Option<DMatrix<f64>>,
    weights: Vec<f64>,
}

impl Ridge {
    pub fn new(experts: usize, lambda: f64, center: RidgeCenter) -> Self {
        let prior = match center {
            RidgeCenter::Zero => DVector::zeros(experts),
            RidgeCenter::Uniform => DVector::from_vec(uniform(experts)),
        };
        let inverse = (lambda > 0.0).then(|| DMatrix::identity(experts, experts) / lambda);
        Self {
            lambda,
            weights: prior.iter().copied().collect(),
            prior,
            gram: DMatrix::zeros(experts, experts),
            xty: DVector::zeros(experts),
            inverse,
        }
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Whether the incremental inverse is active (always, once `lambda > 0`).
    pub fn is_solved(&self) -> bool {
        self.inverse.is_some()
    }

    /// Re-solve the accumulated history under a different `lambda`.
    pub fn with_lambda(&self, lambda: f64) -> Result<Self, NumericalError> {
        let k = self.prior.len();
        let inverse = if lambda > 0.0 {
            let regularized = &self.gram + DMatrix::identity(k, k) * lambda;
            Some(regularized.try_inverse().ok_or_else(|| {
                NumericalError::SingularGram(format!("lambda I + XᵀX not invertible at lambda={lambda}"))
            })?)
        } else {
            self.gram.clone().cholesky().map(|c| c.inverse())
        };
        let mut next = Self {
            lambda,
            prior: self.prior.clone(),
            gram: self.gram.clone(),
            xty: self.xty.clone(),
            inverse,
            weights: Vec::new(),
        };
        next.refresh_weights()?;
        Ok(next)
    }

    fn refresh_weights(&mut self) -> Result<(), NumericalError> {
        let w = match &self.inverse {
            Some(p) => p * (&self.xty + &self.prior * self.lambda),
            None => self.prior.clone(),
        };
        if w.iter().any(|v| !v.is_finite()) {
            return Err(NumericalError::NonFinite("ridge weights".into()));
        }
        self.weights = w.iter().copied().collect();
        Ok(())
    }
}

impl WeightUpdate for Ridge {
    fn name(&self) -> &str {
        "ridge"
    }

    fn weights(&self) -> &[f64] {
        &self.weights
    }

    fn hyperparameters(&self) -> Hyperparameters {
        Hyperparameters {
            lambda: Some(self.lambda),
            ..Default::default()
        }
    }

    fn update(&mut self, x: &[f64], y: f64, _loss: &UpdateLoss) -> Result<(), StepError> {
        let xv = DVector::from_column_slice(x);
        self.gram.ger(1.0, &xv, &xv, 1.0);
        self.xty.axpy(y, &xv, 1.0);

        match self.inverse.as_mut() {
            Some(p) => {
                let px = &*p * &xv;
                let denom = 1.0 + xv.dot(&px);
                if !(denom.is_finite() && denom > 0.0) {
                    return Err(NumericalError::SingularGram(format!(
                        "Sherman-Morrison denominator {denom}"
                    ))
                    .into());
                }
                p.ger(-1.0 / denom, &px, &px, 1.0);
            }
            None => {
                self.inverse = self.gram.clone().cholesky().map(|c| c.inverse());
            }
        }
        self.refresh_weights()?;
        Ok(())
    }
}
