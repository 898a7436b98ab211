//! Run fingerprinting — deterministic identification of configurations and
//! input panels.
//!
//! - `ConfigHash`: BLAKE3 of the canonical JSON of a `MixtureConfig`.
//! - `DatasetHash`: BLAKE3 of the expert names, forecasts and observations.
//! - `RunId`: the pair, used to label exported artifacts.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::MixtureConfig;
use crate::domain::ExpertMatrix;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigHash(pub String);

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHash(pub String);

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic run ID (config + dataset).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId {
    pub config_hash: ConfigHash,
    pub dataset_hash: DatasetHash,
}

impl RunId {
    pub fn new(config: &MixtureConfig, matrix: &ExpertMatrix, y: &[f64]) -> Result<Self, ConfigError> {
        Ok(Self {
            config_hash: config.config_hash()?,
            dataset_hash: dataset_hash(matrix, y),
        })
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = |s: &str| s.chars().take(12).collect::<String>();
        write!(f, "{}-{}", short(&self.config_hash.0), short(&self.dataset_hash.0))
    }
}

impl MixtureConfig {
    /// Hash of the canonical JSON form. Field order is fixed by the struct
    /// definitions, so equal configs always hash equally.
    pub fn config_hash(&self) -> Result<ConfigHash, ConfigError> {
        let json = serde_json::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(ConfigHash(blake3::hash(json.as_bytes()).to_hex().to_string()))
    }
}

/// Content hash of an expert panel and its observations.
pub fn dataset_hash(matrix: &ExpertMatrix, y: &[f64]) -> DatasetHash {
    let mut hasher = blake3::Hasher::new();
    for name in matrix.names() {
        hasher.update(name.as_bytes());
        hasher.update(&[0]);
    }
    for row in matrix.rows() {
        hasher.update(&(row.len() as u64).to_le_bytes());
        for v in row {
            hasher.update(&v.to_le_bytes());
        }
    }
    for v in y {
        hasher.update(&v.to_le_bytes());
    }
    DatasetHash(hasher.finalize().to_hex().to_string())
}
