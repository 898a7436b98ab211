//! Batch application: a fold of `MixtureState::step` over a full panel.
//!
//! Malformed rounds are recorded and skipped; a numerical failure halts the
//! batch and keeps the last good state.

use tracing::{info, warn};

use super::state::MixtureState;
use crate::domain::ExpertMatrix;
use crate::error::{ConfigError, NumericalError, RoundError, StepError};

/// A round skipped during a batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRound {
    /// Row index in the input panel.
    pub index: usize,
    pub error: RoundError,
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub state: MixtureState,
    /// Row indices that were applied, in order.
    pub accepted: Vec<usize>,
    pub rejected: Vec<RejectedRound>,
    /// Set when a numerical failure stopped the batch early.
    pub halted: Option<NumericalError>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.halted.is_none()
    }
}

impl MixtureState {
    /// Apply every round of `matrix` against `y`, starting from this state.
    pub fn run(&self, matrix: &ExpertMatrix, y: &[f64]) -> Result<BatchOutcome, ConfigError> {
        if matrix.rounds() != y.len() {
            return Err(ConfigError::ShapeMismatch {
                expected: matrix.rounds(),
                actual: y.len(),
            });
        }
        let config = self.config();
        if !config.allow_zero_targets && config.update_loss()?.function.needs_nonzero_target() {
            if let Some(round) = y.iter().position(|&v| v == 0.0) {
                return Err(ConfigError::ZeroTarget { round });
            }
        }

        let mut outcome = BatchOutcome {
            state: self.clone(),
            accepted: Vec::with_capacity(y.len()),
            rejected: Vec::new(),
            halted: None,
        };
        for (index, (row, &obs)) in matrix.rows().iter().zip(y).enumerate() {
            match outcome.state.step(row, obs) {
                Ok(next) => {
                    outcome.state = next;
                    outcome.accepted.push(index);
                }
                Err(StepError::Round(error)) => {
                    warn!(round = index, %error, "round rejected");
                    outcome.rejected.push(RejectedRound { index, error });
                }
                Err(StepError::Numerical(error)) => {
                    warn!(round = index, %error, "numerical failure, batch halted");
                    outcome.halted = Some(error);
                    break;
                }
            }
        }

        info!(
            model = config.model.name(),
            accepted = outcome.accepted.len(),
            rejected = outcome.rejected.len(),
            halted = outcome.halted.is_some(),
            loss = outcome.state.forecaster_loss(),
            "batch run complete"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LossConfig, MixtureConfig, ModelConfig};
    use crate::engine::MixtureEngine;
    use crate::loss::LossKind;

    fn percentage(allow_zero_targets: bool) -> MixtureEngine {
        let mut config = MixtureConfig::new(
            ModelConfig::Ewa { eta: Some(1.0) },
            LossConfig {
                kind: LossKind::Percentage,
                gradient_trick: true,
            },
        );
        config.allow_zero_targets = allow_zero_targets;
        MixtureEngine::new(config, 2).unwrap()
    }

    #[test]
    fn shape_mismatch_is_fatal() {
        let e = MixtureEngine::new(
            MixtureConfig::new(ModelConfig::Uniform, LossConfig::default()),
            2,
        )
        .unwrap();
        let m = ExpertMatrix::from_rows(vec![vec![1.0, 2.0]; 3]);
        assert_eq!(
            e.run(&m, &[1.0, 2.0]).unwrap_err(),
            ConfigError::ShapeMismatch {
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn zero_target_fails_up_front_without_override() {
        let m = ExpertMatrix::from_rows(vec![vec![1.0, 2.0]; 3]);
        assert_eq!(
            percentage(false).run(&m, &[1.0, 0.0, 2.0]).unwrap_err(),
            ConfigError::ZeroTarget { round: 1 }
        );
    }

    #[test]
    fn zero_target_rejected_per_round_with_override() {
        let m = ExpertMatrix::from_rows(vec![vec![1.0, 2.0]; 3]);
        let out = percentage(true).run(&m, &[1.0, 0.0, 2.0]).unwrap();
        assert_eq!(out.accepted, vec![0, 2]);
        assert_eq!(
            out.rejected,
            vec![RejectedRound {
                index: 1,
                error: RoundError::ZeroTarget
            }]
        );
        assert_eq!(out.state.round(), 2);
        assert!(out.is_complete());
    }

    #[test]
    fn numerical_failure_halts_and_keeps_the_last_good_state() {
        use crate::config::{Constraint, StepSchedule};

        // A unit step on forecasts of 1e100 sends the weights to -2e200; the
        // second update overflows.
        let e = MixtureEngine::new(
            MixtureConfig::new(
                ModelConfig::OnlineGradient {
                    eta: Some(1.0),
                    schedule: StepSchedule::Constant,
                    constraint: Constraint::Unconstrained,
                },
                LossConfig::default(),
            ),
            2,
        )
        .unwrap();
        let m = ExpertMatrix::from_rows(vec![vec![1e100, 1e100]; 4]);
        let y = [0.0; 4];

        let out = e.run(&m, &y).unwrap();

        assert!(matches!(out.halted, Some(NumericalError::NonFinite(_))));
        assert!(!out.is_complete());
        assert_eq!(out.accepted, vec![0]);
        assert!(out.rejected.is_empty());
        assert_eq!(out.state.round(), 1);
        assert_eq!(out.state.history().len(), 1);

        // Same state as running the good prefix alone.
        let prefix = e.run(&m.select(&[0]), &y[..1]).unwrap();
        assert!(prefix.is_complete());
        assert_eq!(out.state.weights(), prefix.state.weights());
        assert_eq!(out.state.predictions(), prefix.state.predictions());
        assert_eq!(out.state.round_losses(), prefix.state.round_losses());
        assert_eq!(out.state.loss_table(), prefix.state.loss_table());
        assert!(out.state.weights().iter().all(|w| w.is_finite()));
    }

    #[test]
    fn bad_rows_are_skipped() {
        let e = MixtureEngine::new(
            MixtureConfig::new(ModelConfig::Ewa { eta: Some(1.0) }, LossConfig::default()),
            2,
        )
        .unwrap();
        let m = ExpertMatrix::from_rows(vec![
            vec![0.0, 1.0],
            vec![f64::NAN, 1.0],
            vec![0.0, 1.0, 2.0],
            vec![0.0, 1.0],
        ]);
        let out = e.run(&m, &[1.0, 1.0, 1.0, 1.0]).unwrap();
        assert_eq!(out.accepted, vec![0, 3]);
        assert_eq!(out.rejected.len(), 2);
        assert_eq!(out.state.history().len(), 2);
        assert!(out.state.cumulative_loss().iter().all(|c| c.is_finite()));
    }
}
