//! Seeded synthetic expert panels for tests, benchmarks and demos.
//!
//! Clearly fake data: a smooth target plus experts whose accuracy changes by
//! regime. The same spec always produces the same panel.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use mixlab_core::ExpertMatrix;

/// Shape and randomness of a regime-switching panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelSpec {
    pub experts: usize,
    pub rounds: usize,
    /// Rounds per regime; expert `r mod K` leads regime `r`.
    pub regime_length: usize,
    /// Jitter half-width on every expert. Non-leaders also carry a signed
    /// offset of `4 * max(noise, 0.25)`.
    pub noise: f64,
    pub seed: u64,
}

impl Default for PanelSpec {
    fn default() -> Self {
        Self {
            experts: 3,
            rounds: 200,
            regime_length: 50,
            noise: 0.25,
            seed: 42,
        }
    }
}

/// A panel and its observations.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub matrix: ExpertMatrix,
    pub y: Vec<f64>,
}

fn rng_for(seed: u64, label: &str) -> StdRng {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&seed.to_le_bytes());
    hasher.update(label.as_bytes());
    StdRng::from_seed(*hasher.finalize().as_bytes())
}

fn expert_names(k: usize) -> Vec<String> {
    (1..=k).map(|i| format!("expert_{i}")).collect()
}

/// Target `10 + 3 sin(t / 8)` plus small noise; in each regime one expert
/// tracks it closely and the rest carry a signed bias.
pub fn regime_panel(spec: &PanelSpec) -> Panel {
    let mut rng = rng_for(spec.seed, "regime");
    let k = spec.experts.max(1);
    let regime_length = spec.regime_length.max(1);
    let noise = spec.noise.abs();

    let mut rows = Vec::with_capacity(spec.rounds);
    let mut y = Vec::with_capacity(spec.rounds);
    for t in 0..spec.rounds {
        let target = 10.0 + 3.0 * (t as f64 / 8.0).sin() + rng.gen_range(-0.1..=0.1);
        let leader = (t / regime_length) % k;
        let row = (0..k)
            .map(|j| {
                let jitter = if noise > 0.0 { rng.gen_range(-noise..=noise) } else { 0.0 };
                if j == leader {
                    target + jitter
                } else {
                    let sign = if j % 2 == 0 { 1.0 } else { -1.0 };
                    target + sign * 4.0 * noise.max(0.25) + jitter
                }
            })
            .collect();
        rows.push(row);
        y.push(target);
    }
    Panel {
        matrix: ExpertMatrix::new(expert_names(k), rows),
        y,
    }
}

/// Experts drawn uniformly from `[-5, 5]`; the target is exactly
/// `coefficients · x`, so the linear oracle recovers `coefficients`.
pub fn linear_panel(coefficients: &[f64], rounds: usize, seed: u64) -> Panel {
    let mut rng = rng_for(seed, "linear");
    let rows: Vec<Vec<f64>> = (0..rounds)
        .map(|_| coefficients.iter().map(|_| rng.gen_range(-5.0..5.0)).collect())
        .collect();
    let y = rows
        .iter()
        .map(|row| row.iter().zip(coefficients).map(|(x, c)| x * c).sum::<f64>())
        .collect();
    Panel {
        matrix: ExpertMatrix::new(expert_names(coefficients.len()), rows),
        y,
    }
}
