//! Reporting and export — JSON and CSV artifacts for an experiment run.
//!
//! - **JSON**: the full `ExperimentReport`, with schema versioning
//! - **CSV**: per-round trajectory (observation, prediction, weights) and the
//!   cumulative loss table
//!
//! Persisted reports carry a `schema_version`; newer versions are rejected on
//! load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use mixlab_core::MixtureState;

use crate::experiment::{ExperimentReport, ExperimentRun, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &ExperimentReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize ExperimentReport to JSON")
}

/// Deserialize a report, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<ExperimentReport> {
    let report: ExperimentReport =
        serde_json::from_str(json).context("failed to deserialize ExperimentReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// One row per applied round.
///
/// Columns: round, observation, prediction, loss, then one `w_<expert>`
/// column per expert holding the weights used for that round.
pub fn export_trajectory_csv(state: &MixtureState, expert_names: &[String]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec![
        "round".to_string(),
        "observation".to_string(),
        "prediction".to_string(),
        "loss".to_string(),
    ];
    header.extend(expert_names.iter().map(|n| format!("w_{n}")));
    wtr.write_record(&header)?;

    for r in state.history().records() {
        let mut row = vec![
            r.round.to_string(),
            format!("{:.6}", r.observation),
            format!("{:.6}", r.prediction),
            format!("{:.6}", r.forecaster_loss),
        ];
        row.extend(r.weights.iter().map(|w| format!("{w:.6}")));
        wtr.write_record(&row)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Cumulative losses after every round: one column per expert, then the
/// mixture.
pub fn export_loss_csv(state: &MixtureState, expert_names: &[String]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["round".to_string()];
    header.extend(expert_names.iter().cloned());
    header.push("mixture".to_string());
    wtr.write_record(&header)?;

    for row in state.loss_table() {
        let mut record = vec![row.round.to_string()];
        record.extend(row.experts.iter().map(|l| format!("{l:.6}")));
        record.push(format!("{:.6}", row.forecaster));
        wtr.write_record(&record)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the artifact set for one experiment run.
///
/// Creates `{name}_{experiment id prefix}/` under `output_dir` containing:
/// - `report.json` — the full `ExperimentReport`
/// - `trajectory.csv` — per-round predictions and weights
/// - `losses.csv` — cumulative loss table
///
/// Returns the path to the created directory.
pub fn save_artifacts(run: &ExperimentRun, output_dir: &Path) -> Result<PathBuf> {
    let report = &run.report;
    let prefix: String = report.experiment_id.chars().take(12).collect();
    let run_dir = output_dir.join(format!("{}_{}", report.name, prefix));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("report.json"), export_json(report)?)?;

    let names = &report.expert_names;
    let trajectory = export_trajectory_csv(&run.outcome.state, names)?;
    std::fs::write(run_dir.join("trajectory.csv"), trajectory)?;

    let losses = export_loss_csv(&run.outcome.state, names)?;
    std::fs::write(run_dir.join("losses.csv"), losses)?;

    Ok(run_dir)
}

/// Load a report from an artifact directory's `report.json`.
pub fn load_artifacts(dir: &Path) -> Result<ExperimentReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

// ─── Markdown summary ───────────────────────────────────────────────

/// Human-readable summary of a report.
pub fn generate_report(report: &ExperimentReport) -> String {
    let mut md = String::with_capacity(1024);

    md.push_str(&format!("# Experiment: {}\n\n", report.name));
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Run ID | {} |\n", report.run_id));
    md.push_str(&format!("| Model | {} |\n", report.config.mixture.model.name()));
    md.push_str(&format!("| Loss | {} |\n", report.evaluation.loss));
    md.push_str(&format!(
        "| Rounds | {} ({} accepted, {} rejected) |\n",
        report.rounds,
        report.accepted,
        report.rejected.len()
    ));
    if let Some(reason) = &report.halted {
        md.push_str(&format!("| Halted | {reason} |\n"));
    }
    md.push('\n');

    md.push_str("## Mixture vs oracles\n\n");
    md.push_str("| Benchmark | Total loss | RMSE | Regret |\n");
    md.push_str("| --- | --- | --- | --- |\n");
    let mixture = &report.evaluation.mixture;
    md.push_str(&format!(
        "| mixture | {:.4} | {:.4} | |\n",
        mixture.total_loss, mixture.rmse
    ));
    for o in &report.evaluation.oracles {
        match (&o.result, &o.error) {
            (Some(r), _) => md.push_str(&format!(
                "| {} | {:.4} | {:.4} | {:.4} |\n",
                o.kind.name(),
                r.total_loss,
                r.comparison.oracle.rmse,
                o.regret.unwrap_or(f64::NAN)
            )),
            (None, err) => md.push_str(&format!(
                "| {} | failed: {} | | |\n",
                o.kind.name(),
                err.as_deref().unwrap_or("unknown error")
            )),
        }
    }
    md
}
