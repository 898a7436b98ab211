//! Serializable mixture configuration.
//!
//! The model is a tagged union: each variant carries only its own optional
//! hyperparameters. A hyperparameter left as `None` is calibrated online.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::loss::{LossFunction, LossKind, UpdateLoss};

/// Complete configuration of one mixture run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixtureConfig {
    pub model: ModelConfig,
    pub loss: LossConfig,
    /// Accept zero observations with the percentage loss; such rounds are then
    /// rejected one by one instead of failing the whole run up front.
    #[serde(default)]
    pub allow_zero_targets: bool,
}

/// Loss family plus the gradient-trick switch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossConfig {
    pub kind: LossKind,
    #[serde(default = "default_gradient_trick")]
    pub gradient_trick: bool,
}

fn default_gradient_trick() -> bool {
    true
}

impl Default for LossConfig {
    fn default() -> Self {
        Self {
            kind: LossKind::Square,
            gradient_trick: true,
        }
    }
}

/// Weight-update strategy with its hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelConfig {
    /// Fixed `1/K` weights.
    Uniform,
    /// Exponentially weighted average with learning rate `eta`; an infinite
    /// rate follows the leader.
    Ewa {
        #[serde(default, with = "rate_serde")]
        eta: Option<f64>,
    },
    /// Exponential weights with a uniform share `alpha` mixed back in each round.
    FixedShare {
        #[serde(default)]
        eta: Option<f64>,
        #[serde(default)]
        alpha: Option<f64>,
    },
    /// Parameter-free polynomially weighted average.
    Polynomial,
    /// Online ridge regression on the expert forecasts.
    Ridge {
        #[serde(default)]
        lambda: Option<f64>,
        #[serde(default)]
        center: RidgeCenter,
    },
    /// Projected online gradient descent.
    OnlineGradient {
        #[serde(default)]
        eta: Option<f64>,
        #[serde(default)]
        schedule: StepSchedule,
        #[serde(default)]
        constraint: Constraint,
    },
}

/// Point the ridge penalty shrinks toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RidgeCenter {
    /// `lambda * |w|^2`
    #[default]
    Zero,
    /// `lambda * |w - 1/K|^2`
    Uniform,
}

/// Step-size schedule for online gradient descent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepSchedule {
    Constant,
    /// `eta / sqrt(t)`
    #[default]
    InverseSqrt,
}

/// Feasible set for online gradient descent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Constraint {
    #[default]
    Simplex,
    Ball {
        radius: f64,
    },
    Unconstrained,
}

const MODEL_TAGS: &[&str] = &[
    "UNIFORM",
    "EWA",
    "FIXED_SHARE",
    "POLYNOMIAL",
    "RIDGE",
    "ONLINE_GRADIENT",
];
const LOSS_TAGS: &[&str] = &["SQUARE", "ABSOLUTE", "PERCENTAGE", "PINBALL"];

impl ModelConfig {
    /// Resolve a model from its conventional short name, all hyperparameters
    /// left to calibration.
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name.to_ascii_lowercase().as_str() {
            "uniform" => Ok(Self::Uniform),
            "ewa" => Ok(Self::Ewa { eta: None }),
            "fs" | "fixed_share" | "fixedshare" => Ok(Self::FixedShare {
                eta: None,
                alpha: None,
            }),
            "mlpol" | "polynomial" => Ok(Self::Polynomial),
            "ridge" => Ok(Self::Ridge {
                lambda: None,
                center: RidgeCenter::Zero,
            }),
            "ogd" | "online_gradient" => Ok(Self::OnlineGradient {
                eta: None,
                schedule: StepSchedule::InverseSqrt,
                constraint: Constraint::Simplex,
            }),
            _ => Err(ConfigError::UnknownModel(name.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::Ewa { .. } => "ewa",
            Self::FixedShare { .. } => "fixed_share",
            Self::Polynomial => "polynomial",
            Self::Ridge { .. } => "ridge",
            Self::OnlineGradient { .. } => "online_gradient",
        }
    }

    /// Whether any hyperparameter is left to online calibration.
    pub fn needs_calibration(&self) -> bool {
        match self {
            Self::Uniform | Self::Polynomial => false,
            Self::Ewa { eta } | Self::OnlineGradient { eta, .. } => eta.is_none(),
            Self::FixedShare { eta, alpha } => eta.is_none() || alpha.is_none(),
            Self::Ridge { lambda, .. } => lambda.is_none(),
        }
    }

    /// Whether the weights stay on the probability simplex.
    pub fn is_simplex(&self) -> bool {
        match self {
            Self::Ridge { .. } => false,
            Self::OnlineGradient { constraint, .. } => matches!(constraint, Constraint::Simplex),
            _ => true,
        }
    }
}

impl MixtureConfig {
    pub fn new(model: ModelConfig, loss: LossConfig) -> Self {
        Self {
            model,
            loss,
            allow_zero_targets: false,
        }
    }

    /// Parse and validate a TOML document.
    ///
    /// Unknown `type` tags are reported as `UnknownModel` / `UnknownLoss`
    /// rather than as generic parse failures.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let value: toml::Value =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        check_tag(&value, "model", MODEL_TAGS, ConfigError::UnknownModel)?;
        check_tag(&value, "loss", LOSS_TAGS, ConfigError::UnknownLoss)?;
        let config: MixtureConfig = value
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Resolve the loss function and the gradient-trick switch.
    pub fn update_loss(&self) -> Result<UpdateLoss, ConfigError> {
        let function = LossFunction::new(self.loss.kind)?;
        Ok(UpdateLoss::new(function, self.loss.gradient_trick))
    }

    /// Exhaustive construction-time validation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let loss = LossFunction::new(self.loss.kind)?;
        let exp_concave_needed = |model: &'static str| {
            if !loss.is_exp_concave() && !self.loss.gradient_trick {
                Err(ConfigError::IncompatibleLoss {
                    model,
                    loss: loss.name(),
                    reason: "loss is not exp-concave; enable the gradient trick",
                })
            } else {
                Ok(())
            }
        };

        match &self.model {
            ModelConfig::Uniform => Ok(()),
            ModelConfig::Ewa { eta } => {
                check_rate("eta", *eta, true)?;
                exp_concave_needed("ewa")
            }
            ModelConfig::FixedShare { eta, alpha } => {
                check_rate("eta", *eta, false)?;
                if let Some(a) = alpha {
                    if !(0.0..=1.0).contains(a) {
                        return Err(ConfigError::InvalidHyperparameter {
                            name: "alpha",
                            value: *a,
                            reason: "must lie in [0, 1]",
                        });
                    }
                }
                exp_concave_needed("fixed_share")
            }
            ModelConfig::Polynomial => exp_concave_needed("polynomial"),
            ModelConfig::Ridge { lambda, .. } => {
                check_rate("lambda", *lambda, false)?;
                if !loss.is_square() {
                    return Err(ConfigError::IncompatibleLoss {
                        model: "ridge",
                        loss: loss.name(),
                        reason: "ridge regression minimizes the square loss only",
                    });
                }
                Ok(())
            }
            ModelConfig::OnlineGradient {
                eta, constraint, ..
            } => {
                check_rate("eta", *eta, false)?;
                if let Constraint::Ball { radius } = constraint {
                    if !(radius.is_finite() && *radius > 0.0) {
                        return Err(ConfigError::InvalidHyperparameter {
                            name: "radius",
                            value: *radius,
                            reason: "must be finite and positive",
                        });
                    }
                }
                Ok(())
            }
        }
    }
}

fn check_rate(name: &'static str, value: Option<f64>, allow_infinite: bool) -> Result<(), ConfigError> {
    let Some(v) = value else {
        return Ok(());
    };
    if v.is_nan() || v < 0.0 {
        return Err(ConfigError::InvalidHyperparameter {
            name,
            value: v,
            reason: "must be non-negative",
        });
    }
    if v.is_infinite() && !allow_infinite {
        return Err(ConfigError::InvalidHyperparameter {
            name,
            value: v,
            reason: "must be finite",
        });
    }
    Ok(())
}

/// Serde adapter for rates that may be infinite.
///
/// JSON has no infinity, so `±inf` is written as the string `"inf"` /
/// `"-inf"`; plain numbers, TOML's native `inf`, and those strings are all
/// accepted on input.
pub(crate) mod rate_serde {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) if v.is_infinite() => {
                serializer.serialize_some(if *v > 0.0 { "inf" } else { "-inf" })
            }
            other => other.serialize(serializer),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        match Option::<Repr>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Repr::Number(v)) => Ok(Some(v)),
            Some(Repr::Text(text)) => match text.to_ascii_lowercase().as_str() {
                "inf" | "+inf" | "infinity" => Ok(Some(f64::INFINITY)),
                "-inf" | "-infinity" => Ok(Some(f64::NEG_INFINITY)),
                _ => Err(D::Error::custom(format!("invalid rate {text:?}"))),
            },
        }
    }
}

fn check_tag(
    root: &toml::Value,
    table: &str,
    known: &[&str],
    unknown: fn(String) -> ConfigError,
) -> Result<(), ConfigError> {
    let tag = root
        .get(table)
        .and_then(|t| if table == "loss" { t.get("kind") } else { Some(t) })
        .and_then(|t| t.get("type"))
        .and_then(|t| t.as_str());
    match tag {
        Some(tag) if !known.contains(&tag) => Err(unknown(tag.to_string())),
        _ => Ok(()),
    }
}
