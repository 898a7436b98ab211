//! Error taxonomy shared by the engine.
//!
//! - `ConfigError`: fatal at construction, nothing is built.
//! - `RoundError`: one malformed round, rejected atomically, state unchanged.
//! - `NumericalError`: solver or conditioning failure, surfaced distinctly from
//!   bad input.

use thiserror::Error;

/// Configuration rejected at construction time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unknown model variant: {0}")]
    UnknownModel(String),
    #[error("unknown loss type: {0}")]
    UnknownLoss(String),
    #[error("pinball loss requires a quantile tau")]
    MissingQuantile,
    #[error("pinball quantile must lie in (0, 1), got {0}")]
    InvalidQuantile(f64),
    #[error("invalid hyperparameter {name} = {value}: {reason}")]
    InvalidHyperparameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },
    #[error("model {model} is incompatible with loss {loss}: {reason}")]
    IncompatibleLoss {
        model: &'static str,
        loss: &'static str,
        reason: &'static str,
    },
    #[error("percentage loss is undefined: observation {round} is exactly zero (set allow_zero_targets to override)")]
    ZeroTarget { round: usize },
    #[error("at least one expert is required")]
    NoExperts,
    #[error("expected {expected} observation rows, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("config parse error: {0}")]
    Parse(String),
}

/// A single round rejected before touching any state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoundError {
    #[error("expected {expected} expert forecasts, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("expert {expert} forecast is not finite ({value})")]
    NonFiniteExpert { expert: usize, value: f64 },
    #[error("observation is not finite ({0})")]
    NonFiniteObservation(f64),
    #[error("percentage loss undefined at a zero observation")]
    ZeroTarget,
}

/// Solver or matrix-conditioning failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NumericalError {
    #[error("singular Gram matrix: {0}")]
    SingularGram(String),
    #[error("linear program is infeasible (phase-one residual {0:.3e})")]
    Infeasible(f64),
    #[error("linear program is unbounded")]
    Unbounded,
    #[error("solver did not converge within {0} iterations")]
    IterationLimit(usize),
    #[error("non-finite value in solver state: {0}")]
    NonFinite(String),
}

/// Failure of a single streaming step.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StepError {
    #[error("round rejected: {0}")]
    Round(#[from] RoundError),
    #[error("numerical failure: {0}")]
    Numerical(#[from] NumericalError),
}
