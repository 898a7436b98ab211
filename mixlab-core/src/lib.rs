//! MixLab Core — online aggregation of expert forecasts.
//!
//! This crate contains the causal engine:
//! - Loss families and their sub-gradients, with the optional gradient trick
//! - Weight-update strategies (uniform, exponential weights, fixed share,
//!   polynomial potential, online ridge, projected online gradient)
//! - Online calibration of missing hyperparameters as a meta-mixture
//! - The predict-then-reveal engine with persistent, shareable state
//! - Batch runs that are exactly a fold of streaming steps

pub mod calibrate;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod loss;
pub mod strategy;

pub use calibrate::Calibrator;
pub use config::{Constraint, LossConfig, MixtureConfig, ModelConfig, RidgeCenter, StepSchedule};
pub use domain::ExpertMatrix;
pub use engine::{
    run_multivariate, BatchOutcome, History, LossRow, MixtureEngine, MixtureState, Prediction,
    RejectedRound, RoundRecord,
};
pub use error::{ConfigError, NumericalError, RoundError, StepError};
pub use loss::{LossFunction, LossKind, UpdateLoss};
pub use strategy::{Hyperparameters, Strategy, WeightUpdate};
