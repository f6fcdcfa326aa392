use crate::{
    config::check,
    error::{FtrlErr, Result},
};

/// Provides the learning rate of every step.
pub trait LearningRate: Send + Sync {
    /// The rate to use for the current step.
    fn learning_rate(&self) -> f32;

    /// Whether the rate changes between steps.
    fn is_dynamic(&self) -> bool {
        false
    }

    /// Whether different parameters get different rates.
    fn is_group(&self) -> bool {
        false
    }
}

/// A single rate shared by every parameter for the whole training.
#[derive(Debug, Clone, Copy)]
pub struct StaticLr(f32);

impl StaticLr {
    pub fn new(learning_rate: f32) -> Self {
        Self(learning_rate)
    }
}

impl LearningRate for StaticLr {
    fn learning_rate(&self) -> f32 {
        self.0
    }
}

/// Rejects providers this optimizer can't honor.
///
/// # Returns
/// An `UnsupportedLearningRate` error for dynamic or per group providers, an
/// `InvalidHyperparameter` error if the reported rate is negative or not finite.
pub(crate) fn ensure_static(provider: &dyn LearningRate) -> Result<()> {
    if provider.is_dynamic() {
        return Err(FtrlErr::UnsupportedLearningRate("dynamic"));
    }

    if provider.is_group() {
        return Err(FtrlErr::UnsupportedLearningRate("group"));
    }

    let lr = provider.learning_rate();
    check("learning_rate", lr, lr >= 0., ">= 0")
}
