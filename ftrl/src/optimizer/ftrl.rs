use futures::future;
use log::debug;
use rayon::prelude::*;

use crate::{
    accumulator::AccumulatorPair,
    bridge::{self, PsTransport},
    config::{self, FtrlConfig, FtrlSettings, Hyperparams},
    dispatch::{self, UpdatePath},
    error::{FtrlErr, Result},
    gradient::Gradient,
    learning_rate::LearningRate,
    parameter::{Parameter, Residency, RouteKey},
    preprocess::GradientPreprocessor,
    runtime,
};

use super::FtrlBuilder;

/// The optimizer side state of one bound parameter.
#[derive(Debug)]
pub(super) struct Slot {
    pub(super) residency: Residency,
    pub(super) acc: AccumulatorPair,
}

/// The FTRL-proximal optimizer.
///
/// Binds a fixed, ordered list of parameters and updates each of them on every `step`, either
/// locally through the dense or sparse kernel or remotely through a parameter server.
pub struct Ftrl<T: PsTransport> {
    params: Vec<Parameter>,
    slots: Vec<Slot>,
    settings: FtrlSettings,
    learning_rate: Box<dyn LearningRate>,
    preprocessor: Box<dyn GradientPreprocessor>,
    transport: T,
}

impl<T: PsTransport> Ftrl<T> {
    /// Creates a new `Ftrl` optimizer with the default gradient preprocessing and learning rate.
    ///
    /// # Arguments
    /// * `params` - The parameters to bind, in the order gradients will be given to `step`.
    /// * `config` - The optimizer configuration.
    /// * `transport` - The parameter server transport used by server resident parameters.
    ///
    /// # Returns
    /// A new `Ftrl` instance or an error if the configuration is invalid or a parameter name
    /// is bound twice.
    pub fn new(params: Vec<Parameter>, config: FtrlConfig, transport: T) -> Result<Self> {
        FtrlBuilder::new(config).build(params, transport)
    }

    pub(super) fn from_parts(
        params: Vec<Parameter>,
        slots: Vec<Slot>,
        settings: FtrlSettings,
        learning_rate: Box<dyn LearningRate>,
        preprocessor: Box<dyn GradientPreprocessor>,
        transport: T,
    ) -> Self {
        Self {
            params,
            slots,
            settings,
            learning_rate,
            preprocessor,
            transport,
        }
    }

    /// Performs a single update of every bound parameter.
    ///
    /// Every gradient and the learning rate of this step are validated before anything is
    /// mutated. Local parameters are then updated in parallel on the rayon pool while server
    /// resident ones push and pull concurrently.
    ///
    /// # Arguments
    /// * `grads` - One gradient per bound parameter, in binding order.
    ///
    /// # Returns
    /// Whether every parameter was updated, or an error if a gradient doesn't fit its parameter
    /// or the learning rate is invalid. A failed remote update doesn't stop the others.
    pub async fn step(&mut self, mut grads: Vec<Gradient>) -> Result<bool> {
        self.check_gradients(&grads)?;

        let learning_rate = self.learning_rate.learning_rate();
        config::check("learning_rate", learning_rate, learning_rate >= 0., ">= 0")?;

        self.preprocessor.decay_then_scale(&mut grads, &self.params);

        let hyper = Hyperparams {
            learning_rate,
            ..self.settings.hyper
        };
        let use_locking = self.settings.use_locking;

        let mut dense = Vec::new();
        let mut sparse = Vec::new();
        let mut remote = Vec::new();

        for ((param, slot), grad) in self.params.iter().zip(self.slots.iter_mut()).zip(&grads) {
            let Slot { residency, acc } = slot;
            let path = UpdatePath::resolve(residency, grad);
            debug!(param = param.name(), path = path.as_str(); "dispatching update");

            match path {
                UpdatePath::DenseLocal(grad) => dense.push((param, acc, grad)),
                UpdatePath::SparseLocal(grad) => sparse.push((param, acc, grad)),
                UpdatePath::ServerRouted(key) => remote.push((key, param, grad)),
            }
        }

        if !dense.is_empty() || !sparse.is_empty() {
            runtime::run_cpu_bound(|| {
                rayon::join(
                    || {
                        dense.into_par_iter().for_each(|(param, acc, grad)| {
                            dispatch::update_dense_local(param, acc, grad, &hyper, use_locking)
                        })
                    },
                    || {
                        sparse.into_par_iter().for_each(|(param, acc, grad)| {
                            dispatch::update_sparse_local(param, acc, grad, &hyper, use_locking)
                        })
                    },
                )
            });
        }

        let transport = &self.transport;
        let remote = remote
            .into_iter()
            .map(|(key, param, grad)| bridge::push_then_pull(transport, key, hyper, param, grad));

        let results = future::join_all(remote).await;
        Ok(results.into_iter().all(|ok| ok))
    }

    fn check_gradients(&self, grads: &[Gradient]) -> Result<()> {
        if grads.len() != self.params.len() {
            return Err(FtrlErr::GradientCount {
                got: grads.len(),
                expected: self.params.len(),
            });
        }

        self.params
            .iter()
            .zip(grads)
            .try_for_each(|(param, grad)| grad.check_against(param))
    }

    /// The bound parameters, in binding order.
    pub fn parameters(&self) -> &[Parameter] {
        &self.params
    }

    /// The accumulator pair of the parameter named `name`.
    ///
    /// Server resident parameters keep their initial pair, their live state is on the server.
    pub fn accumulators(&self, name: &str) -> Option<&AccumulatorPair> {
        self.position(name).map(|i| &self.slots[i].acc)
    }

    /// The route key of the parameter named `name`, `None` if it's unknown or locally resident.
    pub fn route_key(&self, name: &str) -> Option<&RouteKey> {
        match &self.slots[self.position(name)?].residency {
            Residency::Server(key) => Some(key),
            Residency::Local => None,
        }
    }

    pub fn settings(&self) -> &FtrlSettings {
        &self.settings
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|param| param.name() == name)
    }
}
