//! Decomposition law and persistent-state tests.
//!
//! Running rounds 1..T in one batch must equal running 1..s, then continuing
//! from the resulting state over s+1..T, for every split point s. Earlier
//! states must stay usable after later ones are derived from them.

use mixlab_core::{ExpertMatrix, LossConfig, MixtureConfig, MixtureEngine, ModelConfig, RidgeCenter};

fn panel() -> (ExpertMatrix, Vec<f64>) {
    let rows: Vec<Vec<f64>> = (0..40)
        .map(|t| {
            let t = t as f64;
            vec![t.sin(), (0.5 * t).cos(), 0.1 * t - 2.0]
        })
        .collect();
    let y = rows.iter().map(|x| 0.6 * x[0] + 0.4 * x[1] + 0.05).collect();
    (ExpertMatrix::from_rows(rows), y)
}

fn models() -> Vec<ModelConfig> {
    vec![
        ModelConfig::Ewa { eta: None },
        ModelConfig::FixedShare {
            eta: Some(1.0),
            alpha: Some(0.02),
        },
        ModelConfig::Polynomial,
        ModelConfig::Ridge {
            lambda: Some(0.5),
            center: RidgeCenter::Zero,
        },
        ModelConfig::from_name("ogd").unwrap(),
    ]
}

#[test]
fn split_runs_equal_the_full_run() {
    let (matrix, y) = panel();
    for model in models() {
        let engine = MixtureEngine::new(MixtureConfig::new(model.clone(), LossConfig::default()), 3)
            .unwrap();
        let full = engine.run(&matrix, &y).unwrap();

        for split in [1, 7, 16, 17, 39] {
            let head: Vec<usize> = (0..split).collect();
            let tail: Vec<usize> = (split..40).collect();
            let first = engine.run(&matrix.select(&head), &y[..split]).unwrap();
            let second = first.state.run(&matrix.select(&tail), &y[split..]).unwrap();

            assert_eq!(
                full.state.predictions(),
                second.state.predictions(),
                "{} split at {split}",
                model.name()
            );
            assert_eq!(full.state.weights(), second.state.weights());
            assert_eq!(full.state.cumulative_loss(), second.state.cumulative_loss());
            assert_eq!(full.state.hyperparameters(), second.state.hyperparameters());
        }
    }
}

#[test]
fn earlier_states_remain_usable() {
    let (matrix, y) = panel();
    let engine = MixtureEngine::new(
        MixtureConfig::new(ModelConfig::Ewa { eta: Some(2.0) }, LossConfig::default()),
        3,
    )
    .unwrap();

    let s10 = engine
        .run(&matrix.select(&(0..10).collect::<Vec<_>>()), &y[..10])
        .unwrap()
        .state;
    let before = s10.weights().to_vec();

    // Two different futures from the same state.
    let a = s10.step(matrix.row(10), y[10]).unwrap();
    let b = s10.step(matrix.row(10), y[10] + 5.0).unwrap();

    assert_eq!(s10.weights(), &before[..]);
    assert_eq!(s10.round(), 10);
    assert_eq!(a.round(), 11);
    assert_ne!(a.weights(), b.weights());
    // Both branches report the same ten-round prefix.
    assert_eq!(a.predictions()[..10], b.predictions()[..10]);
    assert_eq!(a.predictions()[..10], s10.predictions()[..]);
}
