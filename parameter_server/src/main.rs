use std::{cell::RefCell, env, fs, io, rc::Rc};

use ftrl::{
    Ftrl, FtrlConfig, Gradient, LearningRateSpec, Parameter, RouteKey, Shape, Tensor,
    initialization::{ParamGen, RandParamGen},
};
use log::{info, warn};
use parameter_server::ParameterServer;
use rand::{Rng, SeedableRng, rngs::StdRng};

const SEED: u64 = 42;
const STEPS: usize = 25;
const DIM: usize = 8;
const VOCAB: usize = 16;
const ROWS_PER_STEP: usize = 4;

/// Fits three parameters to random targets, one dense local, one sparse local embedding and
/// one routed through the in-process parameter server.
///
/// Takes an optional path to a JSON `FtrlConfig` as its first argument.
#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let config = match env::args().nth(1) {
        Some(path) => {
            let json = fs::read_to_string(path)?;
            FtrlConfig::from_json(&json).map_err(io::Error::other)?
        }
        None => FtrlConfig {
            learning_rate: LearningRateSpec::Static(0.5),
            ..Default::default()
        },
    };
    info!("training with {config:?}");

    let rng = Rc::new(RefCell::new(StdRng::seed_from_u64(SEED)));
    let weights = |shape: Shape| -> io::Result<Tensor> {
        RandParamGen::normal(Rc::clone(&rng), shape.numel(), 0., 0.1)
            .map_err(io::Error::other)?
            .sample_tensor(shape)
            .ok_or_else(|| io::Error::other("weight generator exhausted"))
    };
    let target = |shape: Shape| -> io::Result<Tensor> {
        RandParamGen::uniform(Rc::clone(&rng), shape.numel(), -1., 1.)
            .map_err(io::Error::other)?
            .sample_tensor(shape)
            .ok_or_else(|| io::Error::other("target generator exhausted"))
    };

    let dense = Parameter::new("dense", weights([DIM].into())?);
    let embedding = Parameter::new("embedding", weights([VOCAB, DIM].into())?);
    let remote = Parameter::server_resident("remote", weights([DIM].into())?);

    let dense_target = target([DIM].into())?;
    let embedding_target = target([VOCAB, DIM].into())?;
    let remote_target = target([DIM].into())?;

    let server = ParameterServer::new();
    let remote_key = RouteKey::for_param(&remote);
    server
        .register(remote_key.clone(), remote.to_tensor(), config.initial_accum)
        .map_err(io::Error::other)?;

    let params = vec![dense.clone(), embedding.clone(), remote.clone()];
    let mut ftrl = Ftrl::new(params, config, server).map_err(io::Error::other)?;

    for step in 0..STEPS {
        let rows: Vec<usize> = (0..ROWS_PER_STEP)
            .map(|_| rng.borrow_mut().random_range(0..VOCAB))
            .collect();

        let dense_grad = residual(&dense.read(), dense_target.as_slice());
        let remote_grad = residual(&remote.read(), remote_target.as_slice());
        let embedding_grad: Vec<f32> = {
            let weights = embedding.read();
            rows.iter()
                .flat_map(|&row| {
                    let range = row * DIM..(row + 1) * DIM;
                    residual(&weights[range.clone()], &embedding_target.as_slice()[range])
                })
                .collect()
        };

        let loss = [&dense_grad, &remote_grad, &embedding_grad]
            .into_iter()
            .map(|grad| half_squared(grad))
            .sum::<f32>();

        let grads = vec![
            Gradient::Dense(Tensor::new([DIM], dense_grad).map_err(io::Error::other)?),
            Gradient::sparse(
                rows,
                Tensor::new([ROWS_PER_STEP, DIM], embedding_grad).map_err(io::Error::other)?,
            )
            .map_err(io::Error::other)?,
            Gradient::Dense(Tensor::new([DIM], remote_grad).map_err(io::Error::other)?),
        ];

        let ok = ftrl.step(grads).await.map_err(io::Error::other)?;
        if !ok {
            warn!(step = step; "some parameters weren't updated");
        }

        info!(step = step, loss = loss; "step finished");
    }

    let snapshot = ftrl
        .transport()
        .snapshot(&remote_key)
        .map_err(io::Error::other)?;

    info!(
        "server side state of {remote_key}: weights={:?} moment={:?}",
        snapshot.weights.as_slice(),
        snapshot.moment.as_slice(),
    );

    Ok(())
}

/// The gradient of `0.5 * ||weights - target||^2`.
fn residual(weights: &[f32], target: &[f32]) -> Vec<f32> {
    weights.iter().zip(target).map(|(w, t)| w - t).collect()
}

fn half_squared(values: &[f32]) -> f32 {
    0.5 * values.iter().map(|v| v * v).sum::<f32>()
}
