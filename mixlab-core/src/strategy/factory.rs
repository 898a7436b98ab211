//! Factory — converts a `ModelConfig` into a runnable `Strategy`.
//!
//! Fully specified models become the bare variant; a model with any
//! hyperparameter left open is wrapped in a `Calibrator`.

use super::{
    Ewa, FixedShare, Hyperparameters, OnlineGradient, Polynomial, Ridge, Strategy, Uniform,
};
use crate::calibrate::Calibrator;
use crate::config::ModelConfig;
use crate::error::ConfigError;

/// Create the strategy for `experts` experts, calibrating whatever is missing.
pub fn create_strategy(model: &ModelConfig, experts: usize) -> Result<Strategy, ConfigError> {
    if experts == 0 {
        return Err(ConfigError::NoExperts);
    }
    if model.needs_calibration() {
        return Ok(Strategy::Calibrated(Box::new(Calibrator::new(model, experts)?)));
    }
    create_fixed(model, experts, &Hyperparameters::default())
}

/// Create the bare variant, taking each hyperparameter from the config or,
/// when the config leaves it open, from `fill`.
pub fn create_fixed(
    model: &ModelConfig,
    experts: usize,
    fill: &Hyperparameters,
) -> Result<Strategy, ConfigError> {
    let pick = |configured: Option<f64>, filled: Option<f64>, name: &'static str| {
        configured.or(filled).ok_or(ConfigError::InvalidHyperparameter {
            name,
            value: f64::NAN,
            reason: "no value configured or calibrated",
        })
    };

    Ok(match model {
        ModelConfig::Uniform => Strategy::Uniform(Uniform::new(experts)),
        ModelConfig::Ewa { eta } => Strategy::Ewa(Ewa::new(experts, pick(*eta, fill.eta, "eta")?)),
        ModelConfig::FixedShare { eta, alpha } => Strategy::FixedShare(FixedShare::new(
            experts,
            pick(*eta, fill.eta, "eta")?,
            pick(*alpha, fill.alpha, "alpha")?,
        )),
        ModelConfig::Polynomial => Strategy::Polynomial(Polynomial::new(experts)),
        ModelConfig::Ridge { lambda, center } => Strategy::Ridge(Ridge::new(
            experts,
            pick(*lambda, fill.lambda, "lambda")?,
            *center,
        )),
        ModelConfig::OnlineGradient {
            eta,
            schedule,
            constraint,
        } => Strategy::OnlineGradient(OnlineGradient::new(
            experts,
            pick(*eta, fill.eta, "eta")?,
            *schedule,
            *constraint,
        )),
    })
}
