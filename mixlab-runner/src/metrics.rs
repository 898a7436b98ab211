//! Fit metrics — pure functions over a prediction series and its observations.
//!
//! No dependencies on the engine or the oracles.

use serde::{Deserialize, Serialize};

use mixlab_core::{LossFunction, RoundError};

/// Aggregate accuracy of one prediction series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitMetrics {
    /// Sum of the configured loss over all rounds.
    pub total_loss: f64,
    pub mean_loss: f64,
    pub rmse: f64,
    /// `None` when any observation is exactly zero.
    pub mape: Option<f64>,
}

impl FitMetrics {
    /// Returns the first round whose loss is undefined, if any.
    pub fn compute(
        loss: &LossFunction,
        predictions: &[f64],
        y: &[f64],
    ) -> Result<Self, (usize, RoundError)> {
        let total_loss = total_loss(loss, predictions, y)?;
        Ok(Self {
            total_loss,
            mean_loss: if y.is_empty() {
                0.0
            } else {
                total_loss / y.len() as f64
            },
            rmse: rmse(predictions, y),
            mape: mape(predictions, y),
        })
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Sum of `loss(y_t, prediction_t)`, accumulated in round order.
pub fn total_loss(
    loss: &LossFunction,
    predictions: &[f64],
    y: &[f64],
) -> Result<f64, (usize, RoundError)> {
    predictions
        .iter()
        .zip(y)
        .enumerate()
        .try_fold(0.0, |acc, (t, (&p, &obs))| {
            loss.loss(obs, p).map(|l| acc + l).map_err(|e| (t, e))
        })
}

/// Root-mean-square error. Returns 0.0 for an empty series.
pub fn rmse(predictions: &[f64], y: &[f64]) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    let sse: f64 = predictions.iter().zip(y).map(|(p, o)| (o - p).powi(2)).sum();
    (sse / y.len() as f64).sqrt()
}

/// Mean absolute percentage error, as a fraction.
///
/// Undefined when an observation is zero; returns `None` then, and for an
/// empty series.
pub fn mape(predictions: &[f64], y: &[f64]) -> Option<f64> {
    if y.is_empty() || y.iter().any(|&o| o == 0.0) {
        return None;
    }
    let sum: f64 = predictions
        .iter()
        .zip(y)
        .map(|(p, o)| ((o - p) / o).abs())
        .sum();
    Some(sum / y.len() as f64)
}
