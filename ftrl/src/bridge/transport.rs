use serde::{Deserialize, Serialize};

use crate::{
    config::Hyperparams,
    error::RemoteErr,
    gradient::Gradient,
    parameter::RouteKey,
    tensor::Shape,
};

/// The raw inputs of a server routed update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PushPayload<'a> {
    Dense { grad: &'a [f32] },
    Sparse { values: &'a [f32], indices: &'a [usize] },
}

/// A single push towards a parameter server.
///
/// `shapes` lists the shapes of `weight`, `moment` and `linear`, followed by the shapes of
/// `values` and `indices` for sparse payloads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushRequest<'a> {
    pub key: &'a RouteKey,
    pub hyper: Hyperparams,
    pub payload: PushPayload<'a>,
    pub shapes: Vec<Shape>,
}

impl<'a> PushRequest<'a> {
    /// Creates the push of `grad` for the parameter routed through `key`.
    ///
    /// # Arguments
    /// * `key` - The push channel of the parameter.
    /// * `hyper` - The hyperparameters of this step.
    /// * `shape` - The shape of the parameter and therefore of both accumulators.
    /// * `grad` - The already preprocessed gradient.
    ///
    /// # Returns
    /// A new `PushRequest` instance.
    pub fn new(key: &'a RouteKey, hyper: Hyperparams, shape: &Shape, grad: &'a Gradient) -> Self {
        let mut shapes = vec![shape.clone(); 3];

        let payload = match grad {
            Gradient::Dense(grad) => PushPayload::Dense {
                grad: grad.as_slice(),
            },
            Gradient::Sparse(grad) => {
                shapes.push(grad.values().shape().clone());
                shapes.push(grad.indices_shape());
                PushPayload::Sparse {
                    values: grad.values().as_slice(),
                    indices: grad.indices(),
                }
            }
        };

        Self {
            key,
            hyper,
            payload,
            shapes,
        }
    }
}

/// The acknowledgement of an applied push, needed to pull its result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ack {
    pub key: RouteKey,
    pub seq: u64,
}

/// The asynchronous contract of a parameter server.
///
/// A push must be fully applied server side before its acknowledgement is returned, so that
/// pulling with that acknowledgement yields the updated weights.
#[allow(unused)]
#[trait_variant::make(PsTransport: Send)]
pub trait LocalPsTransport {
    /// Sends the raw inputs of an update.
    ///
    /// # Arguments
    /// * `req` - The push request.
    ///
    /// # Returns
    /// The acknowledgement of the applied update or a `RemoteErr`.
    async fn push(&self, req: PushRequest<'_>) -> Result<Ack, RemoteErr>;

    /// Retrieves the weights resulting from an acknowledged push.
    ///
    /// # Arguments
    /// * `ack` - The acknowledgement returned by `push`.
    /// * `out` - Where to write the weights, one value per element of the parameter.
    ///
    /// # Returns
    /// A `RemoteErr` if the weights couldn't be retrieved, `out` may then hold garbage.
    async fn pull(&self, ack: Ack, out: &mut [f32]) -> Result<(), RemoteErr>;
}

/// The transport of an optimizer without server resident parameters, every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoServer;

impl PsTransport for NoServer {
    async fn push(&self, req: PushRequest<'_>) -> Result<Ack, RemoteErr> {
        Err(RemoteErr::new(format!(
            "no parameter server to route {} to",
            req.key
        )))
    }

    async fn pull(&self, ack: Ack, _out: &mut [f32]) -> Result<(), RemoteErr> {
        Err(RemoteErr::new(format!(
            "no parameter server to pull {} from",
            ack.key
        )))
    }
}
