//! Expert forecast matrix: T rounds of K named forecasts.

use serde::{Deserialize, Serialize};

use crate::error::RoundError;

/// Ordered expert forecasts, one row per round.
///
/// Rows are kept as supplied; a malformed row (wrong length, non-finite entry)
/// is only reported when the round is processed, so one bad round never
/// prevents the rest of the matrix from being used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpertMatrix {
    names: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl ExpertMatrix {
    /// Build a matrix with explicit expert names; `K = names.len()`.
    pub fn new(names: Vec<String>, rows: Vec<Vec<f64>>) -> Self {
        Self { names, rows }
    }

    /// Build a matrix whose experts are named `expert_1 .. expert_K`, with K
    /// taken from the first row.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        let k = rows.first().map(|r| r.len()).unwrap_or(0);
        let names = (1..=k).map(|i| format!("expert_{i}")).collect();
        Self { names, rows }
    }

    pub fn experts(&self) -> usize {
        self.names.len()
    }

    pub fn rounds(&self) -> usize {
        self.rows.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn row(&self, t: usize) -> &[f64] {
        &self.rows[t]
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Forecasts of expert `k` across all rounds (missing entries are NaN).
    pub fn column(&self, k: usize) -> Vec<f64> {
        self.rows
            .iter()
            .map(|r| r.get(k).copied().unwrap_or(f64::NAN))
            .collect()
    }

    /// Keep only the given rounds, in the given order.
    pub fn select(&self, rounds: &[usize]) -> Self {
        Self {
            names: self.names.clone(),
            rows: rounds.iter().map(|&t| self.rows[t].clone()).collect(),
        }
    }

    /// Check every row; returns the first malformed round and its reason.
    pub fn validate(&self) -> Result<(), (usize, RoundError)> {
        for (t, row) in self.rows.iter().enumerate() {
            validate_row(row, self.experts()).map_err(|e| (t, e))?;
        }
        Ok(())
    }
}

/// Validate one round's expert vector against the expected width.
pub fn validate_row(row: &[f64], experts: usize) -> Result<(), RoundError> {
    if row.len() != experts {
        return Err(RoundError::LengthMismatch {
            expected: experts,
            actual: row.len(),
        });
    }
    if let Some((expert, &value)) = row.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(RoundError::NonFiniteExpert { expert, value });
    }
    Ok(())
}
