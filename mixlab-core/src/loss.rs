//! Loss families and their sub-gradients.
//!
//! Every loss is a pure function of the observation `y` and a forecast `x`
//! (an expert's value or the aggregate prediction). Gradients are taken with
//! respect to `x`.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, RoundError};

/// Supported loss families (serializable tagged union).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LossKind {
    /// `(y - x)^2`
    Square,
    /// `|y - x|`
    Absolute,
    /// `|y - x| / |y|`, undefined at `y = 0`.
    Percentage,
    /// `max(tau (y - x), (tau - 1)(y - x))`
    Pinball {
        #[serde(default)]
        tau: Option<f64>,
    },
}

impl LossKind {
    /// Resolve a loss family from its conventional name.
    ///
    /// `tau` is only consulted for the pinball family.
    pub fn from_name(name: &str, tau: Option<f64>) -> Result<Self, ConfigError> {
        match name.to_ascii_lowercase().as_str() {
            "square" | "mse" => Ok(Self::Square),
            "absolute" | "mae" => Ok(Self::Absolute),
            "percentage" | "mape" => Ok(Self::Percentage),
            "pinball" | "quantile" => Ok(Self::Pinball { tau }),
            _ => Err(ConfigError::UnknownLoss(name.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Square => "square",
            Self::Absolute => "absolute",
            Self::Percentage => "percentage",
            Self::Pinball { .. } => "pinball",
        }
    }
}

/// A validated loss function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossFunction {
    kind: Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Resolved {
    Square,
    Absolute,
    Percentage,
    Pinball(f64),
}

impl LossFunction {
    pub fn new(kind: LossKind) -> Result<Self, ConfigError> {
        let kind = match kind {
            LossKind::Square => Resolved::Square,
            LossKind::Absolute => Resolved::Absolute,
            LossKind::Percentage => Resolved::Percentage,
            LossKind::Pinball { tau: None } => return Err(ConfigError::MissingQuantile),
            LossKind::Pinball { tau: Some(tau) } => {
                if !(tau > 0.0 && tau < 1.0) {
                    return Err(ConfigError::InvalidQuantile(tau));
                }
                Resolved::Pinball(tau)
            }
        };
        Ok(Self { kind })
    }

    pub fn square() -> Self {
        Self {
            kind: Resolved::Square,
        }
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            Resolved::Square => "square",
            Resolved::Absolute => "absolute",
            Resolved::Percentage => "percentage",
            Resolved::Pinball(_) => "pinball",
        }
    }

    pub fn is_square(&self) -> bool {
        matches!(self.kind, Resolved::Square)
    }

    /// Quantile level, for the pinball family only.
    pub fn quantile(&self) -> Option<f64> {
        match self.kind {
            Resolved::Pinball(tau) => Some(tau),
            _ => None,
        }
    }

    /// Whether exponential weighting on the raw loss keeps its regret bound.
    ///
    /// Only the square loss qualifies (on a bounded prediction range).
    pub fn is_exp_concave(&self) -> bool {
        matches!(self.kind, Resolved::Square)
    }

    /// Whether the loss is undefined at `y = 0`.
    pub fn needs_nonzero_target(&self) -> bool {
        matches!(self.kind, Resolved::Percentage)
    }

    pub fn loss(&self, y: f64, x: f64) -> Result<f64, RoundError> {
        let r = y - x;
        match self.kind {
            Resolved::Square => Ok(r * r),
            Resolved::Absolute => Ok(r.abs()),
            Resolved::Percentage => {
                if y == 0.0 {
                    return Err(RoundError::ZeroTarget);
                }
                Ok(r.abs() / y.abs())
            }
            Resolved::Pinball(tau) => Ok((tau * r).max((tau - 1.0) * r)),
        }
    }

    /// Sub-gradient with respect to the forecast `x`.
    pub fn gradient(&self, y: f64, x: f64) -> Result<f64, RoundError> {
        match self.kind {
            Resolved::Square => Ok(2.0 * (x - y)),
            Resolved::Absolute => Ok(sign(x - y)),
            Resolved::Percentage => {
                if y == 0.0 {
                    return Err(RoundError::ZeroTarget);
                }
                Ok(sign(x - y) / y.abs())
            }
            Resolved::Pinball(tau) => Ok(if x > y { 1.0 - tau } else { -tau }),
        }
    }
}

fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// The loss as seen by a weight update: raw, or linearized at the aggregate
/// prediction when the gradient trick is on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateLoss {
    pub function: LossFunction,
    pub gradient_trick: bool,
}

impl UpdateLoss {
    pub fn new(function: LossFunction, gradient_trick: bool) -> Self {
        Self {
            function,
            gradient_trick,
        }
    }

    /// Per-expert update terms for one round.
    pub fn expert_terms(&self, x: &[f64], y: f64, prediction: f64) -> Result<Vec<f64>, RoundError> {
        if self.gradient_trick {
            let g = self.function.gradient(y, prediction)?;
            Ok(x.iter().map(|xk| g * xk).collect())
        } else {
            x.iter().map(|&xk| self.function.loss(y, xk)).collect()
        }
    }

    /// The aggregate forecaster's own term, on the same scale as `expert_terms`.
    pub fn forecaster_term(&self, y: f64, prediction: f64) -> Result<f64, RoundError> {
        if self.gradient_trick {
            let g = self.function.gradient(y, prediction)?;
            Ok(g * prediction)
        } else {
            self.function.loss(y, prediction)
        }
    }
}
