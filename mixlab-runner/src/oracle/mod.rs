//! Oracle benchmarks — the best combinations in hindsight.
//!
//! Oracles see the whole panel at once. They never feed back into a live
//! mixture; they only tell how well one could possibly have done:
//! - **Expert**: best single expert
//! - **Convex**: best fixed weights on the simplex
//! - **Linear**: best fixed unconstrained weights (optionally penalized)
//! - **Shifting**: best expert sequence with at most `m` switches

pub mod convex;
pub mod expert;
pub mod linear;
pub mod lp;
pub mod shifting;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use mixlab_core::domain::weights::argmin;
use mixlab_core::domain::{dot, uniform, validate_row};
use mixlab_core::{ConfigError, ExpertMatrix, LossFunction, NumericalError, RoundError};

use crate::metrics::FitMetrics;

/// Which benchmark to compute (serializable tagged union).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OracleKind {
    Expert,
    Convex,
    /// `lambda` is a ridge penalty for the square loss and an L1 penalty for
    /// the piecewise-linear losses.
    Linear {
        #[serde(default)]
        lambda: f64,
    },
    Shifting {
        max_switches: usize,
    },
}

impl OracleKind {
    /// Parse `expert`, `convex`, `linear`, `linear(0.5)` or `shifting(3)`.
    pub fn from_name(name: &str) -> Result<Self, OracleError> {
        let lower = name.trim().to_ascii_lowercase();
        let (head, arg) = match lower.split_once('(') {
            Some((head, rest)) => (head.trim(), rest.strip_suffix(')').map(str::trim)),
            None => (lower.as_str(), None),
        };
        let unknown = || OracleError::UnknownOracle(name.to_string());
        match (head, arg) {
            ("expert", None) => Ok(Self::Expert),
            ("convex", None) => Ok(Self::Convex),
            ("linear", None) => Ok(Self::Linear { lambda: 0.0 }),
            ("linear", Some(a)) => a
                .parse()
                .map(|lambda| Self::Linear { lambda })
                .map_err(|_| unknown()),
            ("shifting", Some(a)) => a
                .parse()
                .map(|max_switches| Self::Shifting { max_switches })
                .map_err(|_| unknown()),
            _ => Err(unknown()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Expert => "expert",
            Self::Convex => "convex",
            Self::Linear { .. } => "linear",
            Self::Shifting { .. } => "shifting",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OracleError {
    #[error("unknown oracle: {0}")]
    UnknownOracle(String),
    #[error("oracle needs at least one round and one expert")]
    Empty,
    #[error("expected {expected} observations, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("round {round}: {source}")]
    Round {
        round: usize,
        #[source]
        source: RoundError,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Numerical(#[from] NumericalError),
}

/// What the oracle chose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Coefficients {
    Expert {
        index: usize,
    },
    Weights {
        weights: Vec<f64>,
    },
    Assignment {
        /// Expert followed at each round.
        experts: Vec<usize>,
        switches: usize,
        /// Best total loss with at most `s` switches, for
        /// `s = 0..=min(max_switches, T - 1)`; larger budgets match the last entry.
        switch_curve: Vec<f64>,
    },
}

/// Oracle fit next to the two reference combinations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub oracle: FitMetrics,
    pub uniform: FitMetrics,
    pub best_expert: FitMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleResult {
    pub kind: OracleKind,
    pub loss: String,
    pub coefficients: Coefficients,
    pub total_loss: f64,
    pub mean_loss: f64,
    pub predictions: Vec<f64>,
    pub comparison: Comparison,
}

/// Compute one oracle over the full panel.
pub fn run_oracle(
    kind: OracleKind,
    loss: &LossFunction,
    matrix: &ExpertMatrix,
    y: &[f64],
) -> Result<OracleResult, OracleError> {
    check_panel(loss, matrix, y)?;
    if let OracleKind::Linear { lambda } = kind {
        if !(lambda.is_finite() && lambda >= 0.0) {
            return Err(ConfigError::InvalidHyperparameter {
                name: "lambda",
                value: lambda,
                reason: "must be finite and non-negative",
            }
            .into());
        }
    }

    let table = loss_table(loss, matrix, y)?;
    let totals = expert::column_totals(&table);
    let leader = argmin(&totals);

    let (coefficients, predictions) = match kind {
        OracleKind::Expert => (
            Coefficients::Expert { index: leader },
            matrix.column(leader),
        ),
        OracleKind::Convex => {
            let weights = convex::best_convex(loss, matrix, y)?;
            let predictions = combine(matrix, &weights);
            (Coefficients::Weights { weights }, predictions)
        }
        OracleKind::Linear { lambda } => {
            let weights = linear::best_linear(loss, matrix, y, lambda)?;
            let predictions = combine(matrix, &weights);
            (Coefficients::Weights { weights }, predictions)
        }
        OracleKind::Shifting { max_switches } => {
            let path = shifting::best_shifting(&table, max_switches);
            let predictions = path
                .experts
                .iter()
                .enumerate()
                .map(|(t, &k)| matrix.row(t)[k])
                .collect();
            (
                Coefficients::Assignment {
                    switches: path.switches,
                    experts: path.experts,
                    switch_curve: path.switch_curve,
                },
                predictions,
            )
        }
    };

    let oracle = FitMetrics::compute(loss, &predictions, y).map_err(round_error)?;
    let uniform_predictions = combine(matrix, &uniform(matrix.experts()));
    let uniform = FitMetrics::compute(loss, &uniform_predictions, y).map_err(round_error)?;
    let best_expert = FitMetrics::compute(loss, &matrix.column(leader), y).map_err(round_error)?;

    info!(
        oracle = kind.name(),
        loss = loss.name(),
        total_loss = oracle.total_loss,
        uniform = uniform.total_loss,
        best_expert = best_expert.total_loss,
        "oracle solved"
    );

    Ok(OracleResult {
        kind,
        loss: loss.name().to_string(),
        coefficients,
        total_loss: oracle.total_loss,
        mean_loss: oracle.mean_loss,
        predictions,
        comparison: Comparison {
            oracle,
            uniform,
            best_expert,
        },
    })
}

/// Compute several oracles concurrently; each succeeds or fails on its own.
pub fn run_oracles(
    kinds: &[OracleKind],
    loss: &LossFunction,
    matrix: &ExpertMatrix,
    y: &[f64],
) -> Vec<Result<OracleResult, OracleError>> {
    kinds
        .par_iter()
        .map(|&kind| run_oracle(kind, loss, matrix, y))
        .collect()
}

// ─── Shared helpers ─────────────────────────────────────────────────

fn check_panel(loss: &LossFunction, matrix: &ExpertMatrix, y: &[f64]) -> Result<(), OracleError> {
    if matrix.rounds() == 0 || matrix.experts() == 0 {
        return Err(OracleError::Empty);
    }
    if matrix.rounds() != y.len() {
        return Err(OracleError::ShapeMismatch {
            expected: matrix.rounds(),
            actual: y.len(),
        });
    }
    for (round, (row, &obs)) in matrix.rows().iter().zip(y).enumerate() {
        validate_row(row, matrix.experts()).map_err(|source| OracleError::Round { round, source })?;
        if !obs.is_finite() {
            return Err(OracleError::Round {
                round,
                source: RoundError::NonFiniteObservation(obs),
            });
        }
        if obs == 0.0 && loss.needs_nonzero_target() {
            return Err(OracleError::Round {
                round,
                source: RoundError::ZeroTarget,
            });
        }
    }
    Ok(())
}

fn round_error((round, source): (usize, RoundError)) -> OracleError {
    OracleError::Round { round, source }
}

/// `table[t][k]` = loss of expert k at round t.
pub(crate) fn loss_table(
    loss: &LossFunction,
    matrix: &ExpertMatrix,
    y: &[f64],
) -> Result<Vec<Vec<f64>>, OracleError> {
    matrix
        .rows()
        .iter()
        .zip(y)
        .enumerate()
        .map(|(round, (row, &obs))| {
            row.iter()
                .map(|&x| loss.loss(obs, x))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|source| OracleError::Round { round, source })
        })
        .collect()
}

pub(crate) fn combine(matrix: &ExpertMatrix, weights: &[f64]) -> Vec<f64> {
    matrix.rows().iter().map(|row| dot(weights, row)).collect()
}
