//! BDD tests for experiments and artifacts.
//!
//! These tests verify the end-to-end runner flow:
//! - TOML experiment definition to report
//! - Regret against every requested oracle
//! - Artifact bundle save and reload
//! - Rejected rounds surfacing in the report

use mixlab_core::{ExpertMatrix, LossConfig, LossKind, MixtureConfig, ModelConfig};
use mixlab_runner::export::{load_artifacts, save_artifacts};
use mixlab_runner::{
    regime_panel, run_experiment, run_synthetic_experiment, ExperimentConfig, OracleKind,
    PanelSpec, SCHEMA_VERSION,
};

const EXPERIMENT: &str = r#"
name = "polynomial-regimes"
oracles = [
    { type = "EXPERT" },
    { type = "CONVEX" },
    { type = "SHIFTING", max_switches = 3 },
]

[mixture.model]
type = "POLYNOMIAL"

[mixture.loss]
gradient_trick = true

[mixture.loss.kind]
type = "ABSOLUTE"

[panel]
experts = 3
rounds = 200
regime_length = 50
noise = 0.25
seed = 42
"#;

#[test]
fn bdd_scenario_experiment_from_toml_to_report() {
    // GIVEN an experiment definition with three oracles and a synthetic panel
    let config = ExperimentConfig::from_toml(EXPERIMENT).expect("valid experiment");

    // WHEN the experiment runs
    let run = run_synthetic_experiment(&config).expect("experiment should succeed");
    let report = &run.report;

    // THEN every round is accepted and every oracle is evaluated
    assert_eq!(report.rounds, 200);
    assert_eq!(report.accepted, 200);
    assert_eq!(report.evaluation.oracles.len(), 3);
    assert!(report.evaluation.oracles.iter().all(|o| o.result.is_some()));

    // AND the shifting oracle, which can follow the regime leader, beats
    // the single best expert
    let loss_of = |i: usize| report.evaluation.oracles[i].result.as_ref().unwrap().total_loss;
    assert!(loss_of(2) < loss_of(0));

    // AND the parameter-free mixture is on the simplex at the end
    let sum: f64 = report.final_weights.iter().sum();
    assert!((sum - 1.0).abs() < 1e-9);
}

#[test]
fn bdd_scenario_mixture_beats_uniform_on_regimes() {
    // GIVEN two experts, each leading alternate regimes, biased in opposite
    // directions so that their average is always off
    let panel = regime_panel(&PanelSpec {
        experts: 2,
        ..PanelSpec::default()
    });
    let config = ExperimentConfig::new(
        "ewa-calibrated",
        MixtureConfig::new(ModelConfig::Ewa { eta: None }, LossConfig::default()),
        vec![OracleKind::Expert],
    );

    // WHEN a calibrated EWA mixture runs on it
    let run = run_experiment(&config, &panel.matrix, &panel.y).unwrap();
    let eval = &run.report.evaluation;

    // THEN it does better than the uniform combination
    let uniform = eval.oracles[0].result.as_ref().unwrap().comparison.uniform.total_loss;
    assert!(
        eval.mixture.total_loss < uniform,
        "mixture {} vs uniform {}",
        eval.mixture.total_loss,
        uniform
    );
    // AND reports the learning rate it settled on
    assert!(run.report.hyperparameters.eta.is_some());
}

#[test]
fn bdd_scenario_artifacts_round_trip() {
    // GIVEN a finished experiment
    let config = ExperimentConfig::from_toml(EXPERIMENT).unwrap();
    let run = run_synthetic_experiment(&config).unwrap();

    // WHEN its artifacts are saved to a temp directory
    let dir = tempfile::tempdir().unwrap();
    let run_dir = save_artifacts(&run, dir.path()).expect("save should succeed");

    // THEN the bundle holds the report and both CSV files
    assert!(run_dir.join("report.json").exists());
    assert!(run_dir.join("trajectory.csv").exists());
    assert!(run_dir.join("losses.csv").exists());
    let dirname = run_dir.file_name().unwrap().to_string_lossy().to_string();
    assert!(dirname.starts_with("polynomial-regimes_"));

    // AND the trajectory has a header plus one row per round
    let trajectory = std::fs::read_to_string(run_dir.join("trajectory.csv")).unwrap();
    assert_eq!(trajectory.lines().count(), 201);

    // AND the report reloads with the same identity
    let loaded = load_artifacts(&run_dir).expect("load should succeed");
    assert_eq!(loaded.schema_version, SCHEMA_VERSION);
    assert_eq!(loaded.name, run.report.name);
    assert_eq!(loaded.run_id, run.report.run_id);
    assert_eq!(loaded.experiment_id, run.report.experiment_id);
}

#[test]
fn bdd_scenario_bad_rounds_are_reported_not_fatal() {
    // GIVEN a panel with one non-finite forecast and one short row
    let m = ExpertMatrix::from_rows(vec![
        vec![1.0, 2.0],
        vec![f64::INFINITY, 2.0],
        vec![1.0],
        vec![1.0, 2.0],
    ]);
    let y = [1.5, 1.5, 1.5, 1.5];
    let config = ExperimentConfig::new(
        "bad-rounds",
        MixtureConfig::new(
            ModelConfig::FixedShare {
                eta: Some(0.5),
                alpha: Some(0.05),
            },
            LossConfig {
                kind: LossKind::Square,
                gradient_trick: false,
            },
        ),
        vec![OracleKind::Expert, OracleKind::Linear { lambda: 0.1 }],
    );

    // WHEN the experiment runs
    let run = run_experiment(&config, &m, &y).unwrap();

    // THEN the two bad rounds are listed by index and the rest applied
    let report = &run.report;
    assert_eq!(report.accepted, 2);
    let indices: Vec<usize> = report.rejected.iter().map(|(i, _)| *i).collect();
    assert_eq!(indices, vec![1, 2]);
    assert!(report.halted.is_none());
    // AND the oracles only saw the two good rounds
    assert_eq!(report.evaluation.rounds, 2);
}
