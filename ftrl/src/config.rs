use serde::{Deserialize, Serialize};

use crate::error::{FtrlErr, Result};

/// How the learning rate was requested in a configuration.
///
/// Only `Static` is supported, the other variants exist to reject them explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LearningRateSpec {
    Static(f32),
    Schedule(Vec<f32>),
}

impl Default for LearningRateSpec {
    fn default() -> Self {
        Self::Static(0.001)
    }
}

/// The construction-time configuration of an FTRL optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FtrlConfig {
    pub initial_accum: f32,
    pub learning_rate: LearningRateSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_learning_rates: Option<Vec<f32>>,
    pub lr_power: f32,
    pub l1: f32,
    pub l2: f32,
    pub use_locking: bool,
    pub loss_scale: f32,
    pub weight_decay: f32,
}

impl Default for FtrlConfig {
    fn default() -> Self {
        Self {
            initial_accum: 0.1,
            learning_rate: LearningRateSpec::default(),
            group_learning_rates: None,
            lr_power: -0.5,
            l1: 0.,
            l2: 0.,
            use_locking: false,
            loss_scale: 1.,
            weight_decay: 0.,
        }
    }
}

/// The scalars the update rule needs, shared by every parameter of a step.
///
/// This is also the exact set of hyperparameters attached to every push.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hyperparams {
    pub learning_rate: f32,
    pub l1: f32,
    pub l2: f32,
    pub lr_power: f32,
}

/// A validated, immutable `FtrlConfig`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FtrlSettings {
    pub hyper: Hyperparams,
    pub initial_accum: f32,
    pub use_locking: bool,
    pub loss_scale: f32,
    pub weight_decay: f32,
}

impl FtrlConfig {
    /// Parses a JSON configuration, missing fields take their default value.
    ///
    /// # Returns
    /// A `Config` error on malformed JSON, unknown fields or wrongly typed values.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Validates every hyperparameter.
    ///
    /// # Returns
    /// The validated settings, an `InvalidHyperparameter` error on an out of range value or
    /// an `UnsupportedLearningRate` error if a schedule or per group rates were requested.
    pub fn validate(&self) -> Result<FtrlSettings> {
        let learning_rate = match self.learning_rate {
            LearningRateSpec::Static(lr) => lr,
            LearningRateSpec::Schedule(_) => {
                return Err(FtrlErr::UnsupportedLearningRate("dynamic"));
            }
        };

        if self.group_learning_rates.is_some() {
            return Err(FtrlErr::UnsupportedLearningRate("group"));
        }

        check("initial_accum", self.initial_accum, self.initial_accum >= 0., ">= 0")?;
        check("learning_rate", learning_rate, learning_rate >= 0., ">= 0")?;
        check("lr_power", self.lr_power, self.lr_power <= 0., "<= 0")?;
        check("l1", self.l1, self.l1 >= 0., ">= 0")?;
        check("l2", self.l2, self.l2 >= 0., ">= 0")?;
        check("loss_scale", self.loss_scale, self.loss_scale >= 1., ">= 1")?;
        check("weight_decay", self.weight_decay, self.weight_decay >= 0., ">= 0")?;

        Ok(FtrlSettings {
            hyper: Hyperparams {
                learning_rate,
                l1: self.l1,
                l2: self.l2,
                lr_power: self.lr_power,
            },
            initial_accum: self.initial_accum,
            use_locking: self.use_locking,
            loss_scale: self.loss_scale,
            weight_decay: self.weight_decay,
        })
    }
}

/// Rejects `value` unless it's finite and `holds`.
pub(crate) fn check(
    name: &'static str,
    value: f32,
    holds: bool,
    constraint: &'static str,
) -> Result<()> {
    if value.is_finite() && holds {
        return Ok(());
    }

    Err(FtrlErr::InvalidHyperparameter {
        name,
        value,
        constraint,
    })
}
