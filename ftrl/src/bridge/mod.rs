//! Routing of updates through a parameter server.

mod transport;

pub use transport::{Ack, NoServer, PsTransport, PushPayload, PushRequest};

use log::{debug, warn};

use crate::{
    config::Hyperparams,
    error::RemoteErr,
    gradient::Gradient,
    parameter::{Parameter, RouteKey},
};

/// Pushes `grad` to the server and pulls the resulting weights into `param`.
///
/// The pull lands in a scratch buffer first, the local weights are only overwritten once the
/// whole exchange succeeded.
///
/// # Arguments
/// * `transport` - The parameter server transport.
/// * `key` - The push channel of `param`.
/// * `hyper` - The hyperparameters of this step.
/// * `param` - The server resident parameter.
/// * `grad` - The already validated and preprocessed gradient.
///
/// # Returns
/// Whether the push and the pull both succeeded.
pub(crate) async fn push_then_pull<T: PsTransport>(
    transport: &T,
    key: &RouteKey,
    hyper: Hyperparams,
    param: &Parameter,
    grad: &Gradient,
) -> bool {
    match exchange(transport, key, hyper, param, grad).await {
        Ok(seq) => {
            debug!(param = key.param.as_str(), seq = seq; "pulled server side update");
            true
        }
        Err(e) => {
            warn!(param = key.param.as_str(); "server routed update failed: {e}");
            false
        }
    }
}

async fn exchange<T: PsTransport>(
    transport: &T,
    key: &RouteKey,
    hyper: Hyperparams,
    param: &Parameter,
    grad: &Gradient,
) -> Result<u64, RemoteErr> {
    let req = PushRequest::new(key, hyper, param.shape(), grad);
    let ack = transport.push(req).await?;
    let seq = ack.seq;

    let mut scratch = vec![0.; param.shape().numel()];
    transport.pull(ack, &mut scratch).await?;

    param
        .publish(&scratch)
        .map_err(|e| RemoteErr::new(e.to_string()))?;

    Ok(seq)
}
