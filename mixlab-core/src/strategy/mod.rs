//! Weight-update strategies.
//!
//! Every strategy follows the same protocol: predict with the current weights
//! (`weights · x`), then update once the observation is revealed. Strategies
//! are plain values; the engine clones one before updating so earlier states
//! stay valid.

pub mod ewa;
pub mod factory;
pub mod fixed_share;
pub mod gradient;
pub mod polynomial;
pub mod ridge;
pub mod uniform;

use serde::{Deserialize, Serialize};

use crate::calibrate::Calibrator;
use crate::domain::dot;
use crate::error::{NumericalError, StepError};
use crate::loss::UpdateLoss;

pub use ewa::Ewa;
pub use factory::{create_fixed, create_strategy};
pub use fixed_share::FixedShare;
pub use gradient::OnlineGradient;
pub use polynomial::Polynomial;
pub use ridge::Ridge;
pub use uniform::Uniform;

/// Hyperparameter values in effect for a strategy (unused ones are `None`).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Hyperparameters {
    #[serde(default, with = "crate::config::rate_serde")]
    pub eta: Option<f64>,
    pub alpha: Option<f64>,
    pub lambda: Option<f64>,
}

/// Trait for weight-update rules.
///
/// # Contract
/// - `weights()` is the vector used for the next prediction.
/// - `update()` sees the round's expert vector and observation only after the
///   prediction has been made; it must be deterministic.
/// - On error the strategy may be partially updated; callers discard it.
pub trait WeightUpdate: Send + Sync {
    fn name(&self) -> &str;

    fn weights(&self) -> &[f64];

    fn hyperparameters(&self) -> Hyperparameters;

    fn update(&mut self, x: &[f64], y: f64, loss: &UpdateLoss) -> Result<(), StepError>;

    fn predict(&self, x: &[f64]) -> f64 {
        dot(self.weights(), x)
    }
}

/// Closed set of strategy variants, optionally wrapped in a calibrator.
#[derive(Debug, Clone)]
pub enum Strategy {
    Uniform(Uniform),
    Ewa(Ewa),
    FixedShare(FixedShare),
    Polynomial(Polynomial),
    Ridge(Ridge),
    OnlineGradient(OnlineGradient),
    Calibrated(Box<Calibrator>),
}

impl Strategy {
    fn inner(&self) -> &dyn WeightUpdate {
        match self {
            Self::Uniform(s) => s,
            Self::Ewa(s) => s,
            Self::FixedShare(s) => s,
            Self::Polynomial(s) => s,
            Self::Ridge(s) => s,
            Self::OnlineGradient(s) => s,
            Self::Calibrated(s) => s.as_ref(),
        }
    }

    fn inner_mut(&mut self) -> &mut dyn WeightUpdate {
        match self {
            Self::Uniform(s) => s,
            Self::Ewa(s) => s,
            Self::FixedShare(s) => s,
            Self::Polynomial(s) => s,
            Self::Ridge(s) => s,
            Self::OnlineGradient(s) => s,
            Self::Calibrated(s) => s.as_mut(),
        }
    }

    /// Copy of this strategy, accumulated state included, running with other
    /// hyperparameter values from now on.
    pub fn retuned(&self, hyper: &Hyperparameters) -> Result<Strategy, NumericalError> {
        Ok(match self {
            Self::Ewa(s) => Self::Ewa(s.with_eta(hyper.eta.unwrap_or(s.eta()))),
            Self::FixedShare(s) => Self::FixedShare(s.with_params(
                hyper.eta.unwrap_or(s.eta()),
                hyper.alpha.unwrap_or(s.alpha()),
            )),
            Self::Ridge(s) => Self::Ridge(s.with_lambda(hyper.lambda.unwrap_or(s.lambda()))?),
            Self::OnlineGradient(s) => {
                Self::OnlineGradient(s.with_eta(hyper.eta.unwrap_or(s.eta())))
            }
            other => other.clone(),
        })
    }

    pub fn calibrator(&self) -> Option<&Calibrator> {
        match self {
            Self::Calibrated(c) => Some(c),
            _ => None,
        }
    }
}

impl WeightUpdate for Strategy {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn weights(&self) -> &[f64] {
        self.inner().weights()
    }

    fn hyperparameters(&self) -> Hyperparameters {
        self.inner().hyperparameters()
    }

    fn update(&mut self, x: &[f64], y: f64, loss: &UpdateLoss) -> Result<(), StepError> {
        self.inner_mut().update(x, y, loss)
    }
}
