//! Mixture-versus-oracle evaluation.
//!
//! Oracles are fitted on exactly the rounds the mixture accepted, so the
//! regret `mixture - oracle` compares like with like even when some rounds
//! were rejected or the batch halted early.

use serde::{Deserialize, Serialize};

use mixlab_core::{BatchOutcome, ExpertMatrix, LossFunction};

use crate::metrics::FitMetrics;
use crate::oracle::{run_oracles, OracleError, OracleKind, OracleResult};

/// One oracle's outcome within an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleComparison {
    pub kind: OracleKind,
    /// `None` when the oracle failed; see `error`.
    pub result: Option<OracleResult>,
    pub error: Option<String>,
    /// Mixture total loss minus oracle total loss.
    pub regret: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub loss: String,
    pub rounds: usize,
    pub mixture: FitMetrics,
    pub oracles: Vec<OracleComparison>,
}

/// Compare a finished batch against the requested oracles.
///
/// `matrix` and `y` are the panel the batch was run on. A failing oracle is
/// reported in place and does not fail the evaluation; an undefined mixture
/// loss does.
pub fn evaluate(
    outcome: &BatchOutcome,
    matrix: &ExpertMatrix,
    y: &[f64],
    oracles: &[OracleKind],
) -> Result<Evaluation, OracleError> {
    if matrix.rounds() != y.len() {
        return Err(OracleError::ShapeMismatch {
            expected: matrix.rounds(),
            actual: y.len(),
        });
    }
    let loss = LossFunction::new(outcome.state.config().loss.kind)?;

    let accepted = &outcome.accepted;
    let panel = matrix.select(accepted);
    let observed: Vec<f64> = accepted.iter().map(|&t| y[t]).collect();

    // The batch may have started from a state with earlier rounds; its own
    // rounds are the newest `accepted.len()` records.
    let mut predictions: Vec<f64> = outcome
        .state
        .history()
        .iter()
        .take(accepted.len())
        .map(|r| r.prediction)
        .collect();
    predictions.reverse();

    let mixture = FitMetrics::compute(&loss, &predictions, &observed)
        .map_err(|(t, source)| OracleError::Round {
            round: accepted[t],
            source,
        })?;

    let results = run_oracles(oracles, &loss, &panel, &observed);
    let oracles = oracles
        .iter()
        .zip(results)
        .map(|(&kind, result)| match result {
            Ok(r) => OracleComparison {
                kind,
                regret: Some(mixture.total_loss - r.total_loss),
                result: Some(r),
                error: None,
            },
            Err(e) => OracleComparison {
                kind,
                result: None,
                error: Some(e.to_string()),
                regret: None,
            },
        })
        .collect();

    Ok(Evaluation {
        loss: loss.name().to_string(),
        rounds: accepted.len(),
        mixture,
        oracles,
    })
}
