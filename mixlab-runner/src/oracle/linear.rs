//! Best fixed unconstrained linear combination in hindsight.
//!
//! Square loss: ridge normal equations `(XᵀX + λI) w = Xᵀy`, solved by
//! Cholesky. With `λ = 0` this is ordinary least squares and needs a
//! non-singular Gram matrix.
//!
//! Piecewise-linear losses: a linear program, with `λ |w|_1` as penalty.

use nalgebra::DMatrix;

use mixlab_core::{ExpertMatrix, LossFunction, NumericalError};

use super::convex::normal_equations;
use super::lp::{fit_piecewise_linear, WeightSet};
use super::OracleError;

pub fn best_linear(
    loss: &LossFunction,
    matrix: &ExpertMatrix,
    y: &[f64],
    lambda: f64,
) -> Result<Vec<f64>, OracleError> {
    if !loss.is_square() {
        return fit_piecewise_linear(loss, matrix, y, WeightSet::Free { penalty: lambda });
    }

    let k = matrix.experts();
    let (gram, xty) = normal_equations(matrix, y);
    let regularized = gram + DMatrix::identity(k, k) * lambda;
    let weights = regularized
        .cholesky()
        .ok_or_else(|| {
            NumericalError::SingularGram(format!(
                "{k} experts over {} rounds with lambda = {lambda}",
                matrix.rounds()
            ))
        })?
        .solve(&xty);

    if weights.iter().any(|w| !w.is_finite()) {
        return Err(NumericalError::NonFinite("least-squares weights".into()).into());
    }
    Ok(weights.as_slice().to_vec())
}
