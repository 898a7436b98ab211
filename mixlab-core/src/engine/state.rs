//! Mixture state and the predict-then-reveal protocol.
//!
//! `MixtureState` is an immutable value. `predict()` borrows it and returns a
//! `Prediction`; only `Prediction::reveal(y)` can derive the next state, so an
//! observation can never influence the forecast made for its own round.
//! A rejected round returns an error and leaves the original state untouched.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::history::{History, RoundRecord};
use crate::config::MixtureConfig;
use crate::domain::validate_row;
use crate::error::{NumericalError, RoundError, StepError};
use crate::loss::UpdateLoss;
use crate::strategy::{Hyperparameters, Strategy, WeightUpdate};

#[derive(Debug, Clone)]
pub struct MixtureState {
    config: Arc<MixtureConfig>,
    loss: UpdateLoss,
    experts: usize,
    strategy: Strategy,
    cumulative_loss: Vec<f64>,
    forecaster_loss: f64,
    round: usize,
    history: History,
}

/// Cumulative losses after one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossRow {
    pub round: usize,
    pub experts: Vec<f64>,
    pub forecaster: f64,
}

impl MixtureState {
    pub(crate) fn new(
        config: Arc<MixtureConfig>,
        loss: UpdateLoss,
        experts: usize,
        strategy: Strategy,
    ) -> Self {
        Self {
            config,
            loss,
            experts,
            strategy,
            cumulative_loss: vec![0.0; experts],
            forecaster_loss: 0.0,
            round: 0,
            history: History::new(),
        }
    }

    /// Forecast for the expert vector `x` with the current weights.
    pub fn predict(&self, x: &[f64]) -> Result<Prediction<'_>, RoundError> {
        validate_row(x, self.experts)?;
        Ok(Prediction {
            state: self,
            value: self.strategy.predict(x),
            x: x.to_vec(),
        })
    }

    /// Predict, then reveal `y`: one full round.
    pub fn step(&self, x: &[f64], y: f64) -> Result<MixtureState, StepError> {
        self.predict(x)?.reveal(y)
    }

    pub fn config(&self) -> &MixtureConfig {
        &self.config
    }

    pub fn experts(&self) -> usize {
        self.experts
    }

    /// Number of accepted rounds so far.
    pub fn round(&self) -> usize {
        self.round
    }

    /// Weights for the next prediction.
    pub fn weights(&self) -> &[f64] {
        self.strategy.weights()
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Hyperparameters in effect (the leading candidate's when calibrated).
    pub fn hyperparameters(&self) -> Hyperparameters {
        self.strategy.hyperparameters()
    }

    /// Running total of each expert's raw loss.
    pub fn cumulative_loss(&self) -> &[f64] {
        &self.cumulative_loss
    }

    /// Running total of the mixture's own raw loss.
    pub fn forecaster_loss(&self) -> f64 {
        self.forecaster_loss
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    // ─── Trajectories ───

    pub fn predictions(&self) -> Vec<f64> {
        self.history.records().iter().map(|r| r.prediction).collect()
    }

    pub fn observations(&self) -> Vec<f64> {
        self.history.records().iter().map(|r| r.observation).collect()
    }

    /// Weights used at each round.
    pub fn weight_trajectory(&self) -> Vec<Vec<f64>> {
        self.history.records().iter().map(|r| r.weights.clone()).collect()
    }

    /// Per-round raw losses of the mixture.
    pub fn round_losses(&self) -> Vec<f64> {
        self.history.records().iter().map(|r| r.forecaster_loss).collect()
    }

    /// Cumulative expert and mixture losses after every round.
    pub fn loss_table(&self) -> Vec<LossRow> {
        let mut experts = vec![0.0; self.experts];
        let mut forecaster = 0.0;
        self.history
            .records()
            .iter()
            .map(|r| {
                for (c, l) in experts.iter_mut().zip(&r.expert_losses) {
                    *c += l;
                }
                forecaster += r.forecaster_loss;
                LossRow {
                    round: r.round,
                    experts: experts.clone(),
                    forecaster,
                }
            })
            .collect()
    }
}

/// A forecast waiting for its observation.
#[derive(Debug)]
pub struct Prediction<'a> {
    state: &'a MixtureState,
    x: Vec<f64>,
    value: f64,
}

impl Prediction<'_> {
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Reveal the observation and derive the next state.
    pub fn reveal(self, y: f64) -> Result<MixtureState, StepError> {
        let prev = self.state;
        if !y.is_finite() {
            return Err(RoundError::NonFiniteObservation(y).into());
        }

        // Raw losses first: a percentage loss at y = 0 rejects the round
        // before any strategy state is touched.
        let function = prev.loss.function;
        let expert_losses = self
            .x
            .iter()
            .map(|&xk| function.loss(y, xk))
            .collect::<Result<Vec<_>, _>>()?;
        let forecaster_loss = function.loss(y, self.value)?;

        let mut strategy = prev.strategy.clone();
        strategy.update(&self.x, y, &prev.loss)?;
        if let Some(k) = strategy.weights().iter().position(|w| !w.is_finite()) {
            return Err(NumericalError::NonFinite(format!(
                "{} weight {k} after round {}",
                strategy.name(),
                prev.round
            ))
            .into());
        }

        let cumulative_loss = prev
            .cumulative_loss
            .iter()
            .zip(&expert_losses)
            .map(|(c, l)| c + l)
            .collect();
        let record = RoundRecord {
            round: prev.round,
            experts: self.x,
            observation: y,
            prediction: self.value,
            weights: prev.strategy.weights().to_vec(),
            expert_losses,
            forecaster_loss,
            hyperparameters: prev.strategy.hyperparameters(),
        };

        Ok(MixtureState {
            config: Arc::clone(&prev.config),
            loss: prev.loss,
            experts: prev.experts,
            strategy,
            cumulative_loss,
            forecaster_loss: prev.forecaster_loss + forecaster_loss,
            round: prev.round + 1,
            history: prev.history.push(record),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{LossConfig, MixtureConfig, ModelConfig};
    use crate::engine::MixtureEngine;
    use crate::error::{RoundError, StepError};
    use crate::loss::LossKind;

    fn engine(model: ModelConfig) -> MixtureEngine {
        MixtureEngine::new(MixtureConfig::new(model, LossConfig::default()), 2).unwrap()
    }

    #[test]
    fn prior_state_survives_a_step() {
        let e = engine(ModelConfig::Ewa { eta: Some(1.0) });
        let s0 = e.initial().clone();
        let s1 = s0.step(&[0.0, 1.0], 1.0).unwrap();
        assert_eq!(s0.round(), 0);
        assert_eq!(s0.weights(), &[0.5, 0.5]);
        assert_eq!(s1.round(), 1);
        assert!(s1.weights()[1] > 0.5);
        assert_eq!(s1.history().len(), 1);
    }

    #[test]
    fn malformed_rounds_are_rejected() {
        let s = engine(ModelConfig::Uniform).initial().clone();
        assert_eq!(
            s.step(&[1.0], 1.0).unwrap_err(),
            StepError::Round(RoundError::LengthMismatch {
                expected: 2,
                actual: 1
            })
        );
        assert!(matches!(
            s.step(&[1.0, f64::NAN], 1.0),
            Err(StepError::Round(RoundError::NonFiniteExpert { expert: 1, .. }))
        ));
        assert!(matches!(
            s.step(&[1.0, 1.0], f64::INFINITY),
            Err(StepError::Round(RoundError::NonFiniteObservation(_)))
        ));
    }

    #[test]
    fn zero_target_rejected_under_percentage_loss() {
        let mut config = MixtureConfig::new(
            ModelConfig::Ewa { eta: Some(1.0) },
            LossConfig {
                kind: LossKind::Percentage,
                gradient_trick: true,
            },
        );
        config.allow_zero_targets = true;
        let s = MixtureEngine::new(config, 2).unwrap().initial().clone();
        assert_eq!(
            s.step(&[1.0, 2.0], 0.0).unwrap_err(),
            StepError::Round(RoundError::ZeroTarget)
        );
    }

    #[test]
    fn prediction_value_is_weighted_sum() {
        let s = engine(ModelConfig::Uniform).initial().clone();
        let p = s.predict(&[2.0, 4.0]).unwrap();
        assert_eq!(p.value(), 3.0);
        let next = p.reveal(3.0).unwrap();
        assert_eq!(next.predictions(), vec![3.0]);
        assert_eq!(next.cumulative_loss(), &[1.0, 1.0]);
        assert_eq!(next.forecaster_loss(), 0.0);
    }

    #[test]
    fn loss_table_accumulates() {
        let mut s = engine(ModelConfig::Uniform).initial().clone();
        for _ in 0..3 {
            s = s.step(&[0.0, 2.0], 1.0).unwrap();
        }
        let table = s.loss_table();
        assert_eq!(table.len(), 3);
        assert_eq!(table[2].experts, vec![3.0, 3.0]);
        assert_eq!(table[2].forecaster, 0.0);
        assert_eq!(s.weight_trajectory(), vec![vec![0.5, 0.5]; 3]);
    }
}
