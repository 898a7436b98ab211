//! Experiments: a named mixture configuration plus the oracles to compare it
//! against, loadable from TOML, producing a versioned report.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use mixlab_core::fingerprint::RunId;
use mixlab_core::{
    BatchOutcome, ConfigError, ExpertMatrix, Hyperparameters, MixtureConfig, MixtureEngine,
};

use crate::evaluation::{evaluate, Evaluation};
use crate::oracle::{OracleError, OracleKind};
use crate::synthetic::PanelSpec;

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),
    #[error("experiment has no panel: pass one or set [panel]")]
    NoPanel,
}

/// Serializable experiment definition.
///
/// ```toml
/// name = "ewa-vs-oracles"
/// oracles = [{ type = "EXPERT" }, { type = "SHIFTING", max_switches = 3 }]
///
/// [mixture.model]
/// type = "EWA"
///
/// [mixture.loss.kind]
/// type = "SQUARE"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub name: String,
    #[serde(default)]
    pub oracles: Vec<OracleKind>,
    pub mixture: MixtureConfig,
    /// Synthetic panel to run on when no data is supplied.
    #[serde(default)]
    pub panel: Option<PanelSpec>,
}

impl ExperimentConfig {
    pub fn new(name: impl Into<String>, mixture: MixtureConfig, oracles: Vec<OracleKind>) -> Self {
        Self {
            name: name.into(),
            oracles,
            mixture,
            panel: None,
        }
    }

    /// Parse a TOML document; the mixture section gets the same checks as
    /// `MixtureConfig::from_toml`.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let value: toml::Value =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mixture = value
            .get("mixture")
            .ok_or_else(|| ConfigError::Parse("missing [mixture] section".into()))?;
        let mixture_toml =
            toml::to_string(mixture).map_err(|e| ConfigError::Parse(e.to_string()))?;
        MixtureConfig::from_toml(&mixture_toml)?;

        value
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Deterministic hash of the whole definition.
    pub fn experiment_id(&self) -> Result<String, ConfigError> {
        let json = serde_json::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

/// Persisted summary of one experiment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentReport {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub name: String,
    pub experiment_id: String,
    pub run_id: RunId,
    pub config: ExperimentConfig,
    pub expert_names: Vec<String>,
    pub rounds: usize,
    pub accepted: usize,
    /// `(row index, reason)` for every skipped round.
    pub rejected: Vec<(usize, String)>,
    pub halted: Option<String>,
    pub final_weights: Vec<f64>,
    pub hyperparameters: Hyperparameters,
    pub cumulative_loss: Vec<f64>,
    pub evaluation: Evaluation,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Report plus the full final state, for trajectory export.
#[derive(Debug, Clone)]
pub struct ExperimentRun {
    pub report: ExperimentReport,
    pub outcome: BatchOutcome,
}

/// Run the mixture over the panel and evaluate it against the configured
/// oracles.
pub fn run_experiment(
    config: &ExperimentConfig,
    matrix: &ExpertMatrix,
    y: &[f64],
) -> Result<ExperimentRun, ExperimentError> {
    let engine = MixtureEngine::new(config.mixture.clone(), matrix.experts())?;
    let outcome = engine.run(matrix, y)?;
    let evaluation = evaluate(&outcome, matrix, y, &config.oracles)?;

    let state = &outcome.state;
    let report = ExperimentReport {
        schema_version: SCHEMA_VERSION,
        name: config.name.clone(),
        experiment_id: config.experiment_id()?,
        run_id: RunId::new(&config.mixture, matrix, y)?,
        config: config.clone(),
        expert_names: matrix.names().to_vec(),
        rounds: matrix.rounds(),
        accepted: outcome.accepted.len(),
        rejected: outcome
            .rejected
            .iter()
            .map(|r| (r.index, r.error.to_string()))
            .collect(),
        halted: outcome.halted.as_ref().map(|e| e.to_string()),
        final_weights: state.weights().to_vec(),
        hyperparameters: state.hyperparameters(),
        cumulative_loss: state.cumulative_loss().to_vec(),
        evaluation,
    };
    info!(
        experiment = %report.name,
        run_id = %report.run_id,
        mixture_loss = report.evaluation.mixture.total_loss,
        "experiment finished"
    );

    Ok(ExperimentRun { report, outcome })
}

/// Run on the configured synthetic panel.
pub fn run_synthetic_experiment(config: &ExperimentConfig) -> Result<ExperimentRun, ExperimentError> {
    let spec = config.panel.as_ref().ok_or(ExperimentError::NoPanel)?;
    let panel = crate::synthetic::regime_panel(spec);
    run_experiment(config, &panel.matrix, &panel.y)
}
