//! Look-ahead contamination tests for every strategy.
//!
//! Invariant: the forecast for round t depends only on rounds before t and on
//! the expert vector of round t, never on y_t or anything later.
//!
//! Method: run on a truncated panel (rounds 0..60) and the full panel
//! (rounds 0..120). Predictions and weights for rounds 0..60 must be
//! identical. A second check changes only the final observation and expects
//! every forecast, including the final one, to stay put.

use mixlab_core::{
    Constraint, ExpertMatrix, LossConfig, LossKind, MixtureConfig, MixtureEngine, ModelConfig,
    RidgeCenter, StepSchedule,
};

/// Deterministic pseudo-random panel using a simple LCG.
fn make_panel(rounds: usize, experts: usize) -> (ExpertMatrix, Vec<f64>) {
    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = || {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((seed >> 11) as f64 / (1u64 << 53) as f64) * 2.0 - 1.0
    };
    let mut rows = Vec::with_capacity(rounds);
    let mut y = Vec::with_capacity(rounds);
    for t in 0..rounds {
        let truth = (t as f64 * 0.2).sin() * 2.0 + 3.0;
        rows.push((0..experts).map(|k| truth + (k as f64 - 1.0) * 0.5 + next()).collect());
        y.push(truth + 0.3 * next());
    }
    (ExpertMatrix::from_rows(rows), y)
}

fn all_models() -> Vec<ModelConfig> {
    vec![
        ModelConfig::Uniform,
        ModelConfig::Ewa { eta: Some(0.5) },
        ModelConfig::Ewa { eta: None },
        ModelConfig::FixedShare {
            eta: Some(0.5),
            alpha: Some(0.05),
        },
        ModelConfig::FixedShare {
            eta: None,
            alpha: None,
        },
        ModelConfig::Polynomial,
        ModelConfig::Ridge {
            lambda: Some(1.0),
            center: RidgeCenter::Uniform,
        },
        ModelConfig::Ridge {
            lambda: None,
            center: RidgeCenter::Zero,
        },
        ModelConfig::OnlineGradient {
            eta: Some(0.05),
            schedule: StepSchedule::Constant,
            constraint: Constraint::Unconstrained,
        },
        ModelConfig::OnlineGradient {
            eta: None,
            schedule: StepSchedule::InverseSqrt,
            constraint: Constraint::Simplex,
        },
    ]
}

fn assert_no_lookahead(model: ModelConfig, loss: LossConfig) {
    let (full, y) = make_panel(120, 3);
    let truncated = full.select(&(0..60).collect::<Vec<_>>());
    let engine = MixtureEngine::new(MixtureConfig::new(model.clone(), loss), 3).unwrap();

    let long = engine.run(&full, &y).unwrap();
    let short = engine.run(&truncated, &y[..60]).unwrap();

    let long_predictions = long.state.predictions();
    let long_weights = long.state.weight_trajectory();
    assert_eq!(
        &long_predictions[..60],
        &short.state.predictions()[..],
        "{}: predictions leak future data",
        model.name()
    );
    assert_eq!(
        &long_weights[..60],
        &short.state.weight_trajectory()[..],
        "{}: weights leak future data",
        model.name()
    );
}

#[test]
fn truncated_and_full_runs_agree_square_loss() {
    for model in all_models() {
        assert_no_lookahead(model, LossConfig::default());
    }
}

#[test]
fn truncated_and_full_runs_agree_pinball_loss() {
    let loss = LossConfig {
        kind: LossKind::Pinball { tau: Some(0.8) },
        gradient_trick: true,
    };
    for model in all_models() {
        if matches!(model, ModelConfig::Ridge { .. }) {
            continue;
        }
        assert_no_lookahead(model, loss);
    }
}

#[test]
fn final_observation_cannot_move_its_own_forecast() {
    let (matrix, y) = make_panel(50, 3);
    let mut altered = y.clone();
    altered[49] += 100.0;

    for model in all_models() {
        let engine = MixtureEngine::new(MixtureConfig::new(model.clone(), LossConfig::default()), 3)
            .unwrap();
        let a = engine.run(&matrix, &y).unwrap();
        let b = engine.run(&matrix, &altered).unwrap();
        assert_eq!(
            a.state.predictions(),
            b.state.predictions(),
            "{}: y_t reached the forecast for round t",
            model.name()
        );
        assert_eq!(a.state.round(), b.state.round());
    }
}
