//! Best fixed convex combination in hindsight.
//!
//! Square loss: accelerated projected gradient (FISTA) on
//! `f(w) = |Xw - y|²` over the simplex, started from uniform weights. The
//! step is `1 / L` with `L = 2 λ_max(XᵀX)`. Iterates are scored on the
//! realized loss `Σ (y_t - w·x_t)²`, summed exactly as the reported total is,
//! and the best one seen is returned, so the result never loses to the uniform
//! start, rounding included.
//!
//! Absolute, percentage and pinball losses are piecewise linear, so the
//! problem is an exact linear program.

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use tracing::debug;

use mixlab_core::domain::uniform;
use mixlab_core::domain::weights::project_simplex;
use mixlab_core::{ExpertMatrix, LossFunction};

use super::lp::{fit_piecewise_linear, WeightSet};
use super::{combine, OracleError};

const MAX_ITERATIONS: usize = 10_000;
const TOLERANCE: f64 = 1e-12;

pub fn best_convex(
    loss: &LossFunction,
    matrix: &ExpertMatrix,
    y: &[f64],
) -> Result<Vec<f64>, OracleError> {
    if loss.is_square() {
        Ok(square_simplex(matrix, y))
    } else {
        fit_piecewise_linear(loss, matrix, y, WeightSet::Simplex)
    }
}

/// `(XᵀX, Xᵀy)` for the panel.
pub(crate) fn normal_equations(matrix: &ExpertMatrix, y: &[f64]) -> (DMatrix<f64>, DVector<f64>) {
    let k = matrix.experts();
    let mut gram = DMatrix::zeros(k, k);
    let mut xty = DVector::zeros(k);
    for (row, &obs) in matrix.rows().iter().zip(y) {
        let x = DVector::from_column_slice(row);
        gram.ger(1.0, &x, &x, 1.0);
        xty.axpy(obs, &x, 1.0);
    }
    (gram, xty)
}

fn square_simplex(matrix: &ExpertMatrix, y: &[f64]) -> Vec<f64> {
    let k = matrix.experts();
    let (gram, xty) = normal_equations(matrix, y);
    let lambda_max = SymmetricEigen::new(gram.clone())
        .eigenvalues
        .iter()
        .copied()
        .fold(0.0, f64::max);
    let start = uniform(k);
    if !(lambda_max > 0.0 && lambda_max.is_finite()) {
        return start;
    }
    let step = 1.0 / (2.0 * lambda_max);

    let mut w = DVector::from_vec(start);
    let mut z = w.clone();
    let mut momentum = 1.0_f64;
    let mut best = w.clone();
    let mut best_value = realized_square_loss(matrix, y, w.as_slice());
    let mut iterations = 0;

    for _ in 0..MAX_ITERATIONS {
        iterations += 1;
        let gradient = (&gram * &z - &xty) * 2.0;
        let stepped = &z - gradient * step;
        let next = DVector::from_vec(project_simplex(stepped.as_slice()));

        let value = realized_square_loss(matrix, y, next.as_slice());
        if value < best_value {
            best_value = value;
            best.clone_from(&next);
        }

        let next_momentum = (1.0 + (1.0 + 4.0 * momentum * momentum).sqrt()) / 2.0;
        let moved = (&next - &w).norm();
        z = &next + (&next - &w) * ((momentum - 1.0) / next_momentum);
        w = next;
        momentum = next_momentum;
        if moved < TOLERANCE {
            break;
        }
    }
    debug!(experts = k, iterations, "convex oracle converged");
    best.as_slice().to_vec()
}

/// Total square loss of the combination `w`, accumulated in round order.
fn realized_square_loss(matrix: &ExpertMatrix, y: &[f64], w: &[f64]) -> f64 {
    combine(matrix, w)
        .iter()
        .zip(y)
        .fold(0.0, |acc, (&p, &obs)| {
            let r = obs - p;
            acc + r * r
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixlab_core::LossKind;

    #[test]
    fn square_loss_recovers_mixture() {
        let rows = vec![
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![2.0, 1.0],
            vec![1.0, 3.0],
        ];
        let y: Vec<f64> = rows.iter().map(|r| 0.3 * r[0] + 0.7 * r[1]).collect();
        let m = ExpertMatrix::from_rows(rows);
        let w = best_convex(&LossFunction::square(), &m, &y).unwrap();
        assert!((w[0] - 0.3).abs() < 1e-6);
        assert!((w[1] - 0.7).abs() < 1e-6);
    }

    #[test]
    fn constraint_binds_at_a_vertex() {
        // Target lies outside the hull, beyond expert 1.
        let m = ExpertMatrix::from_rows(vec![vec![0.0, 1.0], vec![0.0, 2.0]]);
        let w = best_convex(&LossFunction::square(), &m, &[5.0, 10.0]).unwrap();
        assert!((w[1] - 1.0).abs() < 1e-9);
        assert!(w[0].abs() < 1e-9);
    }

    #[test]
    fn all_zero_panel_stays_uniform() {
        let m = ExpertMatrix::from_rows(vec![vec![0.0, 0.0, 0.0]]);
        let w = best_convex(&LossFunction::square(), &m, &[1.0]).unwrap();
        assert_eq!(w, uniform(3));
    }

    #[test]
    fn never_loses_to_uniform_on_realized_loss() {
        for seed in 0..20 {
            let s = seed as f64;
            let rows: Vec<Vec<f64>> = (0..12)
                .map(|t| {
                    let t = t as f64;
                    vec![(t + s).sin() * 3.0, (1.7 * t - s).cos(), (0.3 * t * s).sin() + 0.5]
                })
                .collect();
            let y: Vec<f64> = (0..12).map(|t| ((t as f64) * 0.9 + s).cos()).collect();
            let m = ExpertMatrix::from_rows(rows);

            let w = best_convex(&LossFunction::square(), &m, &y).unwrap();
            assert!(
                realized_square_loss(&m, &y, &w) <= realized_square_loss(&m, &y, &uniform(3)),
                "seed {seed}: {w:?}"
            );
        }
    }

    #[test]
    fn uniform_optimum_is_kept() {
        // Symmetric experts around the truth: uniform is exactly optimal.
        let m = ExpertMatrix::from_rows(vec![vec![1.0, -1.0], vec![-2.0, 2.0], vec![0.5, -0.5]]);
        let w = best_convex(&LossFunction::square(), &m, &[0.0; 3]).unwrap();
        assert_eq!(realized_square_loss(&m, &[0.0; 3], &w), 0.0);
    }

    #[test]
    fn absolute_loss_uses_linear_program() {
        let rows = vec![vec![0.0, 4.0], vec![4.0, 0.0], vec![2.0, 2.0], vec![8.0, 0.0]];
        let y: Vec<f64> = rows.iter().map(|r| 0.25 * r[0] + 0.75 * r[1]).collect();
        let m = ExpertMatrix::from_rows(rows);
        let abs = LossFunction::new(LossKind::Absolute).unwrap();
        let w = best_convex(&abs, &m, &y).unwrap();
        assert!((w[0] - 0.25).abs() < 1e-9);
        assert!((w[1] - 0.75).abs() < 1e-9);
    }
}
