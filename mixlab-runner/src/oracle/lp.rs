//! Dense two-phase primal simplex, plus the L1-type regression programs the
//! convex and linear oracles solve with it.
//!
//! `minimize cᵀz  s.t.  A z = b, z ≥ 0`. Rows are sign-normalized so `b ≥ 0`;
//! any row that already owns a unit column starts with that column basic, and
//! only the remaining rows get an artificial variable. Phase one is skipped
//! when no artificial is needed.
//!
//! Pricing is Dantzig's most-negative reduced cost; after a run of degenerate
//! pivots it switches to Bland's rule, which cannot cycle.

use tracing::debug;

use mixlab_core::{ExpertMatrix, LossFunction, NumericalError};

use super::OracleError;

const EPS: f64 = 1e-9;
const FEASIBILITY_TOL: f64 = 1e-7;
const DEGENERATE_STREAK: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct LinearProgram {
    /// Row-major `m × n` equality constraints.
    pub constraints: Vec<Vec<f64>>,
    pub rhs: Vec<f64>,
    pub cost: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LpSolution {
    pub values: Vec<f64>,
    pub objective: f64,
    pub iterations: usize,
}

struct Tableau {
    rows: usize,
    /// Structural plus artificial columns.
    width: usize,
    /// `rows × (width + 1)`, right-hand side last.
    cells: Vec<f64>,
    /// Reduced costs; last entry is minus the current objective.
    reduced: Vec<f64>,
    basis: Vec<usize>,
    iterations: usize,
    limit: usize,
}

impl Tableau {
    fn stride(&self) -> usize {
        self.width + 1
    }

    fn at(&self, r: usize, c: usize) -> f64 {
        self.cells[r * self.stride() + c]
    }

    fn rhs(&self, r: usize) -> f64 {
        self.at(r, self.width)
    }

    fn pivot(&mut self, r: usize, c: usize) {
        let stride = self.stride();
        let start = r * stride;
        let p = self.cells[start + c];
        for v in &mut self.cells[start..start + stride] {
            *v /= p;
        }
        let pivot_row = self.cells[start..start + stride].to_vec();
        for i in (0..self.rows).filter(|&i| i != r) {
            let f = self.cells[i * stride + c];
            if f != 0.0 {
                for (v, p) in self.cells[i * stride..(i + 1) * stride].iter_mut().zip(&pivot_row) {
                    *v -= f * p;
                }
            }
        }
        let f = self.reduced[c];
        if f != 0.0 {
            for (v, p) in self.reduced.iter_mut().zip(&pivot_row) {
                *v -= f * p;
            }
        }
        self.basis[r] = c;
    }

    /// Reset the reduced-cost row for `cost` under the current basis.
    fn price(&mut self, cost: &[f64]) {
        let stride = self.stride();
        self.reduced = cost.to_vec();
        self.reduced.push(0.0);
        for r in 0..self.rows {
            let cb = cost[self.basis[r]];
            if cb != 0.0 {
                for (j, v) in self.reduced.iter_mut().enumerate() {
                    *v -= cb * self.cells[r * stride + j];
                }
            }
        }
    }

    fn entering(&self, allowed: usize, bland: bool) -> Option<usize> {
        let candidates = (0..allowed).filter(|&j| self.reduced[j] < -EPS);
        if bland {
            candidates.min()
        } else {
            candidates.min_by(|&a, &b| self.reduced[a].total_cmp(&self.reduced[b]))
        }
    }

    fn leaving(&self, c: usize) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for r in 0..self.rows {
            let a = self.at(r, c);
            if a <= EPS {
                continue;
            }
            let ratio = self.rhs(r) / a;
            best = match best {
                None => Some((r, ratio)),
                Some((_, b)) if ratio < b - EPS => Some((r, ratio)),
                Some((l, b)) if ratio <= b + EPS && self.basis[r] < self.basis[l] => Some((r, ratio.min(b))),
                keep => keep,
            };
        }
        best.map(|(r, _)| r)
    }

    /// Pivot until no column below `allowed` improves the objective.
    fn optimize(&mut self, allowed: usize) -> Result<(), NumericalError> {
        let mut streak = 0;
        while let Some(c) = self.entering(allowed, streak >= DEGENERATE_STREAK) {
            let r = self.leaving(c).ok_or(NumericalError::Unbounded)?;
            streak = if self.rhs(r).abs() <= EPS { streak + 1 } else { 0 };
            self.pivot(r, c);
            self.iterations += 1;
            if self.iterations > self.limit {
                return Err(NumericalError::IterationLimit(self.limit));
            }
        }
        Ok(())
    }
}

/// Solve a linear program in equality form.
pub fn minimize(lp: &LinearProgram) -> Result<LpSolution, NumericalError> {
    let m = lp.rhs.len();
    let n = lp.cost.len();
    if lp.constraints.len() != m || lp.constraints.iter().any(|row| row.len() != n) {
        return Err(NumericalError::NonFinite("constraint matrix shape".into()));
    }
    let finite = |v: &f64| v.is_finite();
    if !(lp.rhs.iter().all(finite)
        && lp.cost.iter().all(finite)
        && lp.constraints.iter().flatten().all(finite))
    {
        return Err(NumericalError::NonFinite("linear program data".into()));
    }

    // Sign-normalize rows so every right-hand side is non-negative.
    let mut rows = lp.constraints.clone();
    let mut rhs = lp.rhs.clone();
    for (row, b) in rows.iter_mut().zip(rhs.iter_mut()) {
        if *b < 0.0 {
            row.iter_mut().for_each(|v| *v = -*v);
            *b = -*b;
        }
    }

    // Unit columns give a free starting basis.
    let mut nonzeros = vec![0usize; n];
    for row in &rows {
        for (j, v) in row.iter().enumerate() {
            if *v != 0.0 {
                nonzeros[j] += 1;
            }
        }
    }
    let mut taken = vec![false; n];
    let mut start: Vec<Option<usize>> = Vec::with_capacity(m);
    for row in &rows {
        let unit = (0..n).find(|&j| !taken[j] && nonzeros[j] == 1 && row[j] == 1.0);
        if let Some(j) = unit {
            taken[j] = true;
        }
        start.push(unit);
    }
    let artificials = start.iter().filter(|s| s.is_none()).count();
    let width = n + artificials;

    let mut cells = Vec::with_capacity(m * (width + 1));
    let mut basis = Vec::with_capacity(m);
    let mut next_artificial = n;
    for ((row, b), unit) in rows.iter().zip(&rhs).zip(&start) {
        cells.extend_from_slice(row);
        let mut tail = vec![0.0; artificials];
        match unit {
            Some(j) => basis.push(*j),
            None => {
                tail[next_artificial - n] = 1.0;
                basis.push(next_artificial);
                next_artificial += 1;
            }
        }
        cells.extend_from_slice(&tail);
        cells.push(*b);
    }

    let mut tableau = Tableau {
        rows: m,
        width,
        cells,
        reduced: Vec::new(),
        basis,
        iterations: 0,
        limit: 50 * (m + width) + 1_000,
    };

    if artificials > 0 {
        let mut phase_one = vec![0.0; n];
        phase_one.resize(width, 1.0);
        tableau.price(&phase_one);
        tableau.optimize(width)?;

        let residual = -tableau.reduced[width];
        let scale = 1.0 + rhs.iter().copied().fold(0.0, f64::max);
        if residual > FEASIBILITY_TOL * scale {
            return Err(NumericalError::Infeasible(residual));
        }
        // Drive artificials still basic at zero out of the basis; a row with
        // no structural entry left is redundant and keeps its artificial.
        for r in 0..m {
            if tableau.basis[r] >= n {
                if let Some(j) = (0..n).find(|&j| tableau.at(r, j).abs() > EPS) {
                    tableau.pivot(r, j);
                }
            }
        }
    }

    let mut cost = lp.cost.clone();
    cost.resize(width, 0.0);
    tableau.price(&cost);
    tableau.optimize(n)?;

    let mut values = vec![0.0; n];
    for r in 0..m {
        if tableau.basis[r] < n {
            values[tableau.basis[r]] = tableau.rhs(r).max(0.0);
        }
    }
    let objective = values.iter().zip(&lp.cost).map(|(v, c)| v * c).sum();
    debug!(rows = m, columns = n, iterations = tableau.iterations, "linear program solved");

    Ok(LpSolution {
        values,
        objective,
        iterations: tableau.iterations,
    })
}

// ─── L1-type regression ─────────────────────────────────────────────

/// Feasible set for the combination weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeightSet {
    Simplex,
    /// Unconstrained, with `penalty * |w|_1` added to the objective.
    Free { penalty: f64 },
}

/// Per-unit cost of under- and over-prediction at observation `y`.
fn residual_costs(loss: &LossFunction, y: f64) -> (f64, f64) {
    match loss.quantile() {
        Some(tau) => (tau, 1.0 - tau),
        None if loss.needs_nonzero_target() => (1.0 / y.abs(), 1.0 / y.abs()),
        None => (1.0, 1.0),
    }
}

/// Minimize a piecewise-linear loss of `w·x_t` against `y_t` over `set`.
///
/// Each round splits its residual `y_t - w·x_t = u_t - v_t` into
/// under- and over-prediction parts, both non-negative. Free weights are
/// split the same way into `w⁺ - w⁻`.
pub fn fit_piecewise_linear(
    loss: &LossFunction,
    matrix: &ExpertMatrix,
    y: &[f64],
    set: WeightSet,
) -> Result<Vec<f64>, OracleError> {
    let rounds = matrix.rounds();
    let k = matrix.experts();
    let weight_columns = match set {
        WeightSet::Simplex => k,
        WeightSet::Free { .. } => 2 * k,
    };
    let n = weight_columns + 2 * rounds;
    let u = |t: usize| weight_columns + t;
    let v = |t: usize| weight_columns + rounds + t;

    let mut constraints = Vec::with_capacity(rounds + 1);
    let mut rhs = Vec::with_capacity(rounds + 1);
    let mut cost = vec![0.0; n];
    if let WeightSet::Free { penalty } = set {
        cost[..weight_columns].iter_mut().for_each(|c| *c = penalty);
    }

    for (t, (row, &obs)) in matrix.rows().iter().zip(y).enumerate() {
        let mut a = vec![0.0; n];
        for (j, &x) in row.iter().enumerate() {
            a[j] = x;
            if matches!(set, WeightSet::Free { .. }) {
                a[k + j] = -x;
            }
        }
        a[u(t)] = 1.0;
        a[v(t)] = -1.0;
        let (under, over) = residual_costs(loss, obs);
        cost[u(t)] = under;
        cost[v(t)] = over;
        constraints.push(a);
        rhs.push(obs);
    }
    if set == WeightSet::Simplex {
        let mut a = vec![0.0; n];
        a[..k].iter_mut().for_each(|c| *c = 1.0);
        constraints.push(a);
        rhs.push(1.0);
    }

    let solution = minimize(&LinearProgram {
        constraints,
        rhs,
        cost,
    })?;
    let weights = match set {
        WeightSet::Simplex => solution.values[..k].to_vec(),
        WeightSet::Free { .. } => (0..k)
            .map(|j| solution.values[j] - solution.values[k + j])
            .collect(),
    };
    Ok(weights)
}
