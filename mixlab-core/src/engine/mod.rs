//! Mixture engine — the round-by-round predict/observe protocol.
//!
//! `MixtureEngine::new` validates the configuration and builds the initial
//! state. From there every round derives a new `MixtureState`; batch runs are
//! a fold of the same step, so batch and streaming results are identical.

pub mod batch;
pub mod history;
pub mod multivariate;
pub mod state;

use std::sync::Arc;

pub use batch::{BatchOutcome, RejectedRound};
pub use history::{History, RoundRecord};
pub use multivariate::run_multivariate;
pub use state::{LossRow, MixtureState, Prediction};

use crate::config::MixtureConfig;
use crate::domain::ExpertMatrix;
use crate::error::ConfigError;
use crate::strategy::create_strategy;

/// A validated configuration bound to a panel width.
#[derive(Debug, Clone)]
pub struct MixtureEngine {
    initial: MixtureState,
}

impl MixtureEngine {
    pub fn new(config: MixtureConfig, experts: usize) -> Result<Self, ConfigError> {
        config.validate()?;
        let loss = config.update_loss()?;
        let strategy = create_strategy(&config.model, experts)?;
        Ok(Self {
            initial: MixtureState::new(Arc::new(config), loss, experts, strategy),
        })
    }

    /// State before any round.
    pub fn initial(&self) -> &MixtureState {
        &self.initial
    }

    pub fn config(&self) -> &MixtureConfig {
        self.initial.config()
    }

    pub fn experts(&self) -> usize {
        self.initial.experts()
    }

    /// Apply every round from the initial state.
    pub fn run(&self, matrix: &ExpertMatrix, y: &[f64]) -> Result<BatchOutcome, ConfigError> {
        self.initial.run(matrix, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LossConfig, ModelConfig};
    use crate::loss::LossKind;

    #[test]
    fn invalid_config_builds_nothing() {
        let config = MixtureConfig::new(
            ModelConfig::Polynomial,
            LossConfig {
                kind: LossKind::Absolute,
                gradient_trick: false,
            },
        );
        assert!(matches!(
            MixtureEngine::new(config, 3),
            Err(ConfigError::IncompatibleLoss { .. })
        ));
        let ok = MixtureConfig::new(ModelConfig::Uniform, LossConfig::default());
        assert_eq!(MixtureEngine::new(ok, 0).unwrap_err(), ConfigError::NoExperts);
    }

    #[test]
    fn engine_reuses_initial_state() {
        let e = MixtureEngine::new(
            MixtureConfig::new(ModelConfig::Ewa { eta: Some(1.0) }, LossConfig::default()),
            2,
        )
        .unwrap();
        let m = ExpertMatrix::from_rows(vec![vec![0.0, 1.0]; 4]);
        let a = e.run(&m, &[1.0; 4]).unwrap();
        let b = e.run(&m, &[1.0; 4]).unwrap();
        assert_eq!(a.state.predictions(), b.state.predictions());
        assert_eq!(e.initial().round(), 0);
    }
}
