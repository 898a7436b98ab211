//! D-dimensional targets as D independent engines.
//!
//! Each dimension has its own expert panel and observation sequence; no
//! weights are shared, so the dimensions run in parallel.

use rayon::prelude::*;

use super::batch::BatchOutcome;
use super::MixtureEngine;
use crate::config::MixtureConfig;
use crate::domain::ExpertMatrix;
use crate::error::ConfigError;

/// Run one engine per dimension. Results come back in dimension order.
pub fn run_multivariate(
    config: &MixtureConfig,
    panels: &[ExpertMatrix],
    targets: &[Vec<f64>],
) -> Result<Vec<BatchOutcome>, ConfigError> {
    if panels.len() != targets.len() {
        return Err(ConfigError::ShapeMismatch {
            expected: panels.len(),
            actual: targets.len(),
        });
    }
    let experts = panels.first().map(ExpertMatrix::experts).unwrap_or(0);
    let engine = MixtureEngine::new(config.clone(), experts)?;

    panels
        .par_iter()
        .zip(targets.par_iter())
        .map(|(panel, y)| engine.run(panel, y))
        .collect()
}
