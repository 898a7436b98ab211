//! Online hyperparameter calibration.
//!
//! A model with a missing learning rate or penalty runs a grid of fully
//! specified candidates side by side and mixes them with an outer
//! polynomially weighted average. The outer forecaster has no
//! hyperparameters of its own, so calibration never recurses. It always
//! scores candidates on the raw loss of their forecasts, whatever update loss
//! the candidates themselves use.
//!
//! Grid: `v·2^j` for `j ∈ [-J, J]`, `J = ceil(log2 T̂)`. The horizon guess `T̂`
//! starts at 16 and doubles each time the round count reaches it; the two new
//! extreme candidates are copies of the current extremes re-tuned to the new
//! value, so they inherit everything seen so far. The base `v` is 1, except
//! for online gradient descent where it is `1 / ‖x_1‖²`, fixed from the first
//! round's expert vector. A missing fixed-share `alpha` is searched over a
//! fixed set instead.
//!
//! A candidate whose forecast or weights stop being finite is frozen: it is
//! no longer updated and takes no part in the blend.

use rayon::prelude::*;
use tracing::debug;

use crate::config::ModelConfig;
use crate::domain::dot;
use crate::domain::weights::argmax;
use crate::error::{ConfigError, NumericalError, StepError};
use crate::loss::UpdateLoss;
use crate::strategy::{create_fixed, Hyperparameters, Polynomial, Strategy, WeightUpdate};

/// Initial guess of the number of rounds.
pub const INITIAL_HORIZON: u64 = 16;

/// Values tried for a missing fixed-share mixing rate.
pub const ALPHA_GRID: [f64; 4] = [1e-4, 1e-3, 1e-2, 1e-1];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scale {
    Eta,
    Lambda,
}

#[derive(Debug, Clone)]
struct Candidate {
    level: i32,
    alpha: Option<f64>,
    live: bool,
    strategy: Strategy,
}

#[derive(Debug, Clone)]
pub struct Calibrator {
    name: &'static str,
    experts: usize,
    scale: Option<Scale>,
    base: f64,
    scale_from_features: bool,
    horizon: u64,
    levels: i32,
    rounds: u64,
    candidates: Vec<Candidate>,
    meta: Polynomial,
    weights: Vec<f64>,
}

fn levels_for(horizon: u64) -> i32 {
    (horizon as f64).log2().ceil() as i32
}

fn candidate_hyper(
    scale: Option<Scale>,
    base: f64,
    level: i32,
    alpha: Option<f64>,
) -> Hyperparameters {
    let value = Some(base * 2f64.powi(level));
    let mut hyper = Hyperparameters {
        alpha,
        ..Default::default()
    };
    match scale {
        Some(Scale::Eta) => hyper.eta = value,
        Some(Scale::Lambda) => hyper.lambda = value,
        None => {}
    }
    hyper
}

impl Calibrator {
    pub fn new(model: &ModelConfig, experts: usize) -> Result<Self, ConfigError> {
        if experts == 0 {
            return Err(ConfigError::NoExperts);
        }
        let scale = match model {
            ModelConfig::Ewa { eta: None }
            | ModelConfig::FixedShare { eta: None, .. }
            | ModelConfig::OnlineGradient { eta: None, .. } => Some(Scale::Eta),
            ModelConfig::Ridge { lambda: None, .. } => Some(Scale::Lambda),
            _ => None,
        };
        let alphas: Vec<Option<f64>> = match model {
            ModelConfig::FixedShare { alpha: None, .. } => ALPHA_GRID.iter().copied().map(Some).collect(),
            _ => vec![None],
        };

        let levels = levels_for(INITIAL_HORIZON);
        let range: Vec<i32> = if scale.is_some() {
            (-levels..=levels).collect()
        } else {
            vec![0]
        };

        let mut candidates = Vec::with_capacity(alphas.len() * range.len());
        for &alpha in &alphas {
            for &level in &range {
                let hyper = candidate_hyper(scale, 1.0, level, alpha);
                candidates.push(Candidate {
                    level,
                    alpha,
                    live: true,
                    strategy: create_fixed(model, experts, &hyper)?,
                });
            }
        }

        let mut calibrator = Self {
            name: model.name(),
            experts,
            scale,
            base: 1.0,
            scale_from_features: matches!(model, ModelConfig::OnlineGradient { eta: None, .. }),
            horizon: INITIAL_HORIZON,
            levels,
            rounds: 0,
            meta: Polynomial::new(candidates.len()),
            candidates,
            weights: Vec::new(),
        };
        if let Some(outer) = calibrator.live_weights() {
            calibrator.weights = calibrator.blend(&outer);
        }
        Ok(calibrator)
    }

    /// Hyperparameters of the live candidate holding the most outer weight.
    pub fn leading(&self) -> Hyperparameters {
        let outer = self
            .live_weights()
            .unwrap_or_else(|| self.meta.weights().to_vec());
        self.candidates
            .get(argmax(&outer))
            .map(|c| c.strategy.hyperparameters())
            .unwrap_or_default()
    }

    pub fn horizon(&self) -> u64 {
        self.horizon
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Candidates still being updated.
    pub fn live_count(&self) -> usize {
        self.candidates.iter().filter(|c| c.live).count()
    }

    /// Hyperparameters of every candidate, in grid order: the initial grid
    /// first, then extensions in the order they were added.
    pub fn candidates(&self) -> Vec<Hyperparameters> {
        self.candidates
            .iter()
            .map(|c| c.strategy.hyperparameters())
            .collect()
    }

    /// Outer weights over the candidates.
    pub fn candidate_weights(&self) -> &[f64] {
        self.meta.weights()
    }

    /// Outer weights renormalized over live candidates; frozen ones get 0.
    /// Uniform over the live set when all outer mass sits on frozen ones.
    fn live_weights(&self) -> Option<Vec<f64>> {
        let live = self.live_count();
        if live == 0 {
            return None;
        }
        if live == self.candidates.len() {
            return Some(self.meta.weights().to_vec());
        }
        let total: f64 = self
            .meta
            .weights()
            .iter()
            .zip(&self.candidates)
            .filter(|(_, c)| c.live)
            .map(|(m, _)| m)
            .sum();
        Some(
            self.meta
                .weights()
                .iter()
                .zip(&self.candidates)
                .map(|(m, c)| match (c.live, total > 0.0) {
                    (false, _) => 0.0,
                    (true, true) => m / total,
                    (true, false) => 1.0 / live as f64,
                })
                .collect(),
        )
    }

    fn blend(&self, outer: &[f64]) -> Vec<f64> {
        let mut blended = vec![0.0; self.experts];
        for (m, c) in outer.iter().zip(&self.candidates) {
            if *m == 0.0 {
                continue;
            }
            for (b, w) in blended.iter_mut().zip(c.strategy.weights()) {
                *b += m * w;
            }
        }
        blended
    }

    fn rescale(&mut self, x: &[f64]) -> Result<(), StepError> {
        let norm = dot(x, x);
        if !(norm > 0.0 && norm.is_finite()) {
            return Ok(());
        }
        self.base = norm.recip();
        for c in &mut self.candidates {
            let hyper = candidate_hyper(self.scale, self.base, c.level, c.alpha);
            c.strategy = c.strategy.retuned(&hyper)?;
        }
        debug!(base = self.base, "calibration grid scaled to expert magnitude");
        Ok(())
    }

    fn extend(&mut self) -> Result<(), StepError> {
        self.horizon *= 2;
        let next = levels_for(self.horizon);
        if self.scale.is_none() || next <= self.levels {
            self.levels = next.max(self.levels);
            return Ok(());
        }

        let mut fresh = Vec::new();
        for c in self.candidates.iter().filter(|c| c.level.abs() == self.levels) {
            let level = c.level.signum() * next;
            let hyper = candidate_hyper(self.scale, self.base, level, c.alpha);
            fresh.push(Candidate {
                level,
                alpha: c.alpha,
                live: c.live,
                strategy: c.strategy.retuned(&hyper)?,
            });
        }
        for c in fresh {
            self.meta.push_expert();
            self.candidates.push(c);
        }
        self.levels = next;
        debug!(
            horizon = self.horizon,
            candidates = self.candidates.len(),
            "calibration grid extended"
        );
        Ok(())
    }
}

impl WeightUpdate for Calibrator {
    fn name(&self) -> &str {
        self.name
    }

    fn weights(&self) -> &[f64] {
        &self.weights
    }

    fn hyperparameters(&self) -> Hyperparameters {
        self.leading()
    }

    fn update(&mut self, x: &[f64], y: f64, loss: &UpdateLoss) -> Result<(), StepError> {
        if self.rounds == 0 && self.scale_from_features {
            self.rescale(x)?;
        }
        let live_before = self.live_count();

        let mut forecasts = Vec::with_capacity(self.candidates.len());
        for c in &mut self.candidates {
            let f = c.strategy.predict(x);
            if c.live && !(f.is_finite() && loss.function.loss(y, f)?.is_finite()) {
                c.live = false;
            }
            forecasts.push(f);
        }
        // Frozen candidates echo the pooled forecast of the live ones, so
        // their outer regret stops moving.
        let outer = self.live_weights().ok_or_else(|| diverged(self.name))?;
        let pooled = dot(&outer, &forecasts_or_zero(&forecasts, &outer));
        for (f, c) in forecasts.iter_mut().zip(&self.candidates) {
            if !c.live {
                *f = pooled;
            }
        }

        let outcomes: Vec<Result<(), StepError>> = self
            .candidates
            .par_iter_mut()
            .filter(|c| c.live)
            .map(|c| match c.strategy.update(x, y, loss) {
                Ok(()) => {
                    c.live = c.strategy.weights().iter().all(|w| w.is_finite());
                    Ok(())
                }
                Err(StepError::Numerical(_)) => {
                    c.live = false;
                    Ok(())
                }
                Err(e) => Err(e),
            })
            .collect();
        outcomes.into_iter().collect::<Result<(), _>>()?;

        let raw = UpdateLoss::new(loss.function, false);
        self.meta.update(&forecasts, y, &raw)?;

        let frozen = live_before - self.live_count();
        if frozen > 0 {
            debug!(
                frozen,
                live = self.live_count(),
                round = self.rounds,
                "calibration candidates diverged"
            );
        }

        self.rounds += 1;
        if self.rounds >= self.horizon {
            self.extend()?;
        }
        let outer = self.live_weights().ok_or_else(|| diverged(self.name))?;
        self.weights = self.blend(&outer);
        Ok(())
    }
}

fn diverged(name: &str) -> NumericalError {
    NumericalError::NonFinite(format!("every {name} calibration candidate diverged"))
}

/// Forecasts with the entries of zero-weight candidates replaced by 0, so a
/// non-finite forecast cannot reach the weighted sum.
fn forecasts_or_zero(forecasts: &[f64], outer: &[f64]) -> Vec<f64> {
    forecasts
        .iter()
        .zip(outer)
        .map(|(&f, &m)| if m == 0.0 { 0.0 } else { f })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Constraint, RidgeCenter, StepSchedule};
    use crate::domain::is_on_simplex;
    use crate::loss::LossFunction;

    fn raw_square() -> UpdateLoss {
        UpdateLoss::new(LossFunction::square(), false)
    }

    #[test]
    fn grid_sizes() {
        let ewa = Calibrator::new(&ModelConfig::Ewa { eta: None }, 2).unwrap();
        assert_eq!(ewa.candidate_count(), 9);

        let both = ModelConfig::FixedShare {
            eta: None,
            alpha: None,
        };
        assert_eq!(Calibrator::new(&both, 2).unwrap().candidate_count(), 36);

        let alpha_only = ModelConfig::FixedShare {
            eta: Some(1.0),
            alpha: None,
        };
        let c = Calibrator::new(&alpha_only, 2).unwrap();
        assert_eq!(c.candidate_count(), 4);
        assert!(c.candidates().iter().all(|h| h.eta == Some(1.0)));
    }

    #[test]
    fn starts_uniform() {
        let c = Calibrator::new(&ModelConfig::Ewa { eta: None }, 4).unwrap();
        assert!(c.weights().iter().all(|w| (w - 0.25).abs() < 1e-15));
    }

    #[test]
    fn grid_grows_at_horizon() {
        let loss = raw_square();
        let mut c = Calibrator::new(&ModelConfig::Ewa { eta: None }, 2).unwrap();
        for _ in 0..INITIAL_HORIZON {
            c.update(&[0.0, 1.0], 1.0, &loss).unwrap();
            assert!(is_on_simplex(c.weights()));
        }
        assert_eq!(c.horizon(), 2 * INITIAL_HORIZON);
        assert_eq!(c.candidate_count(), 11);

        let etas: Vec<f64> = c.candidates().iter().filter_map(|h| h.eta).collect();
        assert!(etas.contains(&(1.0 / 32.0)));
        assert!(etas.contains(&32.0));
        // Newcomers join with zero regret and no weight.
        assert_eq!(c.candidate_weights()[9], 0.0);
        assert_eq!(c.candidate_weights()[10], 0.0);
    }

    #[test]
    fn aggressive_rate_leads_on_a_perfect_expert() {
        let loss = raw_square();
        let mut c = Calibrator::new(&ModelConfig::Ewa { eta: None }, 2).unwrap();
        for _ in 0..INITIAL_HORIZON {
            c.update(&[0.0, 1.0], 1.0, &loss).unwrap();
        }
        assert_eq!(c.leading().eta, Some(16.0));
        assert!(c.weights()[1] > 0.99);
    }

    #[test]
    fn updates_are_deterministic() {
        let loss = UpdateLoss::new(LossFunction::square(), true);
        let model = ModelConfig::FixedShare {
            eta: None,
            alpha: None,
        };
        let run = || {
            let mut c = Calibrator::new(&model, 3).unwrap();
            for t in 0..40 {
                let t = t as f64;
                c.update(&[t.sin(), t.cos(), 0.5], (t * 0.3).sin(), &loss).unwrap();
            }
            c.weights().to_vec()
        };
        assert_eq!(run(), run());
    }

    fn unconstrained_gradient() -> ModelConfig {
        ModelConfig::OnlineGradient {
            eta: None,
            schedule: StepSchedule::InverseSqrt,
            constraint: Constraint::Unconstrained,
        }
    }

    #[test]
    fn gradient_grid_is_scaled_by_the_first_expert_vector() {
        let mut c = Calibrator::new(&unconstrained_gradient(), 3).unwrap();
        c.update(&[1.0, 2.0, 2.0], 1.0, &raw_square()).unwrap();
        let etas: Vec<f64> = c.candidates().iter().filter_map(|h| h.eta).collect();
        assert_eq!(etas.len(), 9);
        assert!(etas.iter().any(|&e| (e - 1.0 / 9.0).abs() < 1e-15));
        assert!(etas.iter().any(|&e| (e - 16.0 / 9.0).abs() < 1e-15));
    }

    #[test]
    fn diverging_candidates_are_frozen_out_of_the_blend() {
        let loss = UpdateLoss::new(LossFunction::square(), true);
        let mut c = Calibrator::new(&unconstrained_gradient(), 3).unwrap();
        for t in 0..200 {
            let t = t as f64;
            let x = [4.0 + t.sin(), 5.0 + t.cos(), 3.0 + 0.5 * (2.0 * t).sin()];
            c.update(&x, 0.5 * x[0] + 0.5 * x[1], &loss).unwrap();
            assert!(c.weights().iter().all(|w| w.is_finite()), "round {t}: {:?}", c.weights());
        }
        // The largest rates overshoot and are dropped; the rest carry on.
        assert!(c.live_count() > 0);
        assert!(c.live_count() < c.candidate_count());
        assert!(c.leading().eta.is_some_and(f64::is_finite));
    }

    #[test]
    fn ridge_penalty_is_calibrated() {
        let model = ModelConfig::Ridge {
            lambda: None,
            center: RidgeCenter::Zero,
        };
        let mut c = Calibrator::new(&model, 2).unwrap();
        for t in 0..20 {
            let t = t as f64;
            let x = [t.sin(), t.cos()];
            c.update(&x, 2.0 * x[0] - x[1], &raw_square()).unwrap();
        }
        assert!(c.leading().lambda.is_some());
        assert_eq!(c.weights().len(), 2);
    }
}
