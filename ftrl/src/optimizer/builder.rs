use std::collections::HashSet;

use log::info;

use super::{Ftrl, ftrl::Slot};
use crate::{
    accumulator::AccumulatorPair,
    bridge::PsTransport,
    config::FtrlConfig,
    error::{FtrlErr, Result},
    learning_rate::{self, LearningRate, StaticLr},
    parameter::{Parameter, Residency},
    preprocess::{DecayThenScale, GradientPreprocessor},
};

/// Builds `Ftrl` optimizers out of a configuration and optional custom collaborators.
pub struct FtrlBuilder {
    config: FtrlConfig,
    learning_rate: Option<Box<dyn LearningRate>>,
    preprocessor: Option<Box<dyn GradientPreprocessor>>,
}

impl FtrlBuilder {
    /// Creates a new `FtrlBuilder`.
    ///
    /// # Arguments
    /// * `config` - The optimizer configuration, validated on `build`.
    ///
    /// # Returns
    /// A new `FtrlBuilder` instance.
    pub fn new(config: FtrlConfig) -> Self {
        Self {
            config,
            learning_rate: None,
            preprocessor: None,
        }
    }

    /// Replaces the configured static rate with a custom provider.
    ///
    /// Providers reporting a dynamic or per group rate make `build` fail.
    pub fn learning_rate<L: LearningRate + 'static>(mut self, provider: L) -> Self {
        self.learning_rate = Some(Box::new(provider));
        self
    }

    /// Replaces the weight decay and loss scale preprocessing.
    pub fn preprocessor<P: GradientPreprocessor + 'static>(mut self, preprocessor: P) -> Self {
        self.preprocessor = Some(Box::new(preprocessor));
        self
    }

    /// Validates the configuration and binds `params`.
    ///
    /// Allocates the accumulator pair of every parameter and resolves its residency once.
    ///
    /// # Arguments
    /// * `params` - The parameters to bind, in the order gradients will be given to `step`.
    /// * `transport` - The parameter server transport used by server resident parameters.
    ///
    /// # Returns
    /// A new `Ftrl` instance or an error if the configuration or the learning rate provider
    /// is invalid, or if two parameters share a name.
    pub fn build<T: PsTransport>(self, params: Vec<Parameter>, transport: T) -> Result<Ftrl<T>> {
        let settings = self.config.validate()?;

        let learning_rate: Box<dyn LearningRate> = match self.learning_rate {
            Some(provider) => {
                learning_rate::ensure_static(provider.as_ref())?;
                provider
            }
            None => Box::new(StaticLr::new(settings.hyper.learning_rate)),
        };

        let preprocessor = self.preprocessor.unwrap_or_else(|| {
            Box::new(DecayThenScale::new(
                settings.weight_decay,
                settings.loss_scale,
            ))
        });

        let mut names = HashSet::with_capacity(params.len());
        if let Some(dup) = params.iter().find(|param| !names.insert(param.name())) {
            return Err(FtrlErr::DuplicateParameter {
                param: dup.name().to_string(),
            });
        }

        let slots: Vec<_> = params
            .iter()
            .map(|param| Slot {
                residency: Residency::of(param),
                acc: AccumulatorPair::for_parameter(param, settings.initial_accum),
            })
            .collect();

        let remote = params.iter().filter(|p| p.is_server_resident()).count();
        info!(
            params = params.len(),
            local = params.len() - remote,
            remote = remote,
            use_locking = settings.use_locking;
            "ftrl optimizer bound"
        );

        Ok(Ftrl::from_parts(
            params,
            slots,
            settings,
            learning_rate,
            preprocessor,
            transport,
        ))
    }
}
