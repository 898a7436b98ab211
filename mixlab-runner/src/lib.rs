//! MixLab Runner — oracle benchmarks, evaluation, experiments, export.
//!
//! This crate builds on `mixlab-core` to provide:
//! - Hindsight oracles: best expert, best convex and linear combinations,
//!   best sequence with a bounded number of switches
//! - A dense two-phase simplex solver for the piecewise-linear losses
//! - Fit metrics and mixture-versus-oracle regret
//! - TOML experiment definitions with versioned JSON/CSV artifacts
//! - Seeded synthetic panels

pub mod evaluation;
pub mod experiment;
pub mod export;
pub mod metrics;
pub mod oracle;
pub mod synthetic;

pub use evaluation::{evaluate, Evaluation, OracleComparison};
pub use experiment::{
    run_experiment, run_synthetic_experiment, ExperimentConfig, ExperimentError, ExperimentReport,
    ExperimentRun, SCHEMA_VERSION,
};
pub use metrics::FitMetrics;
pub use oracle::{
    run_oracle, run_oracles, Coefficients, Comparison, OracleError, OracleKind, OracleResult,
};
pub use synthetic::{linear_panel, regime_panel, Panel, PanelSpec};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn oracle_types_are_send_sync() {
        assert_send::<OracleKind>();
        assert_sync::<OracleKind>();
        assert_send::<OracleResult>();
        assert_sync::<OracleResult>();
        assert_send::<OracleError>();
        assert_sync::<OracleError>();
    }

    #[test]
    fn fit_metrics_is_send_sync() {
        assert_send::<FitMetrics>();
        assert_sync::<FitMetrics>();
    }

    #[test]
    fn evaluation_is_send_sync() {
        assert_send::<Evaluation>();
        assert_sync::<Evaluation>();
    }

    #[test]
    fn experiment_types_are_send_sync() {
        assert_send::<ExperimentConfig>();
        assert_sync::<ExperimentConfig>();
        assert_send::<ExperimentReport>();
        assert_sync::<ExperimentReport>();
        assert_send::<ExperimentRun>();
        assert_sync::<ExperimentRun>();
    }

    #[test]
    fn panel_is_send_sync() {
        assert_send::<PanelSpec>();
        assert_sync::<PanelSpec>();
        assert_send::<Panel>();
        assert_sync::<Panel>();
    }
}
