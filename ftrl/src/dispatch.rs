use crate::{
    accumulator::AccumulatorPair,
    config::Hyperparams,
    gradient::{Gradient, SparseGradient},
    kernel,
    parameter::{Parameter, Residency, RouteKey},
    tensor::Tensor,
};

/// Dense updates without `use_locking` take the weight lock once per this many elements.
const LOCK_CHUNK: usize = 1 << 12;

/// The way a single parameter is updated on a given step.
///
/// Each variant borrows exactly what its update needs, so the optimizer routes on this value
/// alone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpdatePath<'a> {
    /// A local parameter and a dense gradient.
    DenseLocal(&'a Tensor),
    /// A local parameter and a row-sparse gradient.
    SparseLocal(&'a SparseGradient),
    /// A server resident parameter, pushed under its route key.
    ServerRouted(&'a RouteKey),
}

impl<'a> UpdatePath<'a> {
    /// Resolves the path of one parameter update.
    ///
    /// Server resident parameters are always routed to the server, whatever the gradient's density.
    ///
    /// # Arguments
    /// * `residency` - Where the parameter lives, resolved at bind time.
    /// * `grad` - The gradient of this step.
    ///
    /// # Returns
    /// The resolved `UpdatePath`.
    pub fn resolve(residency: &'a Residency, grad: &'a Gradient) -> Self {
        match (residency, grad) {
            (Residency::Server(key), _) => Self::ServerRouted(key),
            (Residency::Local, Gradient::Dense(grad)) => Self::DenseLocal(grad),
            (Residency::Local, Gradient::Sparse(grad)) => Self::SparseLocal(grad),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DenseLocal(_) => "dense_local",
            Self::SparseLocal(_) => "sparse_local",
            Self::ServerRouted(_) => "server_routed",
        }
    }
}

/// Applies a dense gradient to a locally resident parameter.
///
/// # Arguments
/// * `param` - The parameter to update.
/// * `acc` - Its accumulator pair.
/// * `grad` - A gradient of the parameter's shape.
/// * `hyper` - The hyperparameters of this step.
/// * `use_locking` - Whether to hold the weight lock for the whole update.
pub(crate) fn update_dense_local(
    param: &Parameter,
    acc: &mut AccumulatorPair,
    grad: &Tensor,
    hyper: &Hyperparams,
    use_locking: bool,
) {
    let (moment, linear) = acc.split_mut();
    let grad = grad.as_slice();

    if use_locking {
        let mut weights = param.write();
        kernel::apply_dense(&mut weights, moment, linear, grad, hyper);
        return;
    }

    let chunks = moment
        .chunks_mut(LOCK_CHUNK)
        .zip(linear.chunks_mut(LOCK_CHUNK))
        .zip(grad.chunks(LOCK_CHUNK))
        .enumerate();

    for (i, ((moment, linear), grad)) in chunks {
        let start = i * LOCK_CHUNK;
        let mut weights = param.write();
        let weights = &mut weights[start..start + grad.len()];
        kernel::apply_dense(weights, moment, linear, grad, hyper);
    }
}

/// Applies a sparse gradient to a locally resident parameter, row by row in index order.
///
/// # Arguments
/// * `param` - The parameter to update.
/// * `acc` - Its accumulator pair.
/// * `grad` - A sparse gradient whose indices are in bounds for `param`.
/// * `hyper` - The hyperparameters of this step.
/// * `use_locking` - Whether to hold the weight lock for the whole update.
pub(crate) fn update_sparse_local(
    param: &Parameter,
    acc: &mut AccumulatorPair,
    grad: &SparseGradient,
    hyper: &Hyperparams,
    use_locking: bool,
) {
    let Some(row_len) = param.shape().row_len() else {
        return;
    };

    let (moment, linear) = acc.split_mut();
    let indices = grad.indices();
    let values = grad.values().as_slice();

    if use_locking {
        let mut weights = param.write();
        kernel::apply_sparse(&mut weights, moment, linear, indices, values, row_len, hyper);
        return;
    }

    if row_len == 0 {
        return;
    }

    for (&index, grad_row) in indices.iter().zip(values.chunks_exact(row_len)) {
        let mut weights = param.write();
        kernel::apply_row(&mut weights, moment, linear, index, row_len, grad_row, hyper);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HYPER: Hyperparams = Hyperparams {
        learning_rate: 0.1,
        l1: 0.,
        l2: 0.,
        lr_power: -0.5,
    };

    #[test]
    fn server_residency_wins_over_density() {
        let param = Parameter::server_resident("w", Tensor::full([2, 2], 0.));
        let key = RouteKey::for_param(&param);
        let remote = Residency::Server(key.clone());
        let dense = Gradient::Dense(Tensor::full([2, 2], 1.));
        let sparse = Gradient::sparse(vec![1], Tensor::full([1, 2], 1.)).unwrap();

        assert_eq!(UpdatePath::resolve(&remote, &dense), UpdatePath::ServerRouted(&key));
        assert_eq!(UpdatePath::resolve(&remote, &sparse), UpdatePath::ServerRouted(&key));
    }

    #[test]
    fn local_paths_carry_their_gradient() {
        let dense = Gradient::Dense(Tensor::full([2, 2], 1.));
        let sparse = Gradient::sparse(vec![1], Tensor::full([1, 2], 1.)).unwrap();

        match UpdatePath::resolve(&Residency::Local, &dense) {
            UpdatePath::DenseLocal(grad) => assert_eq!(grad.as_slice(), &[1.; 4]),
            path => panic!("unexpected path {}", path.as_str()),
        }
        match UpdatePath::resolve(&Residency::Local, &sparse) {
            UpdatePath::SparseLocal(grad) => assert_eq!(grad.indices(), &[1]),
            path => panic!("unexpected path {}", path.as_str()),
        }
    }

    #[test]
    fn locking_mode_doesnt_change_dense_results() {
        let numel = 3 * LOCK_CHUNK + 5;
        let grad = Tensor::new([numel], (0..numel).map(|i| (i % 7) as f32 - 3.).collect()).unwrap();

        let results: Vec<_> = [true, false]
            .into_iter()
            .map(|use_locking| {
                let param = Parameter::new("w", Tensor::full([numel], 0.2));
                let mut acc = AccumulatorPair::for_parameter(&param, 0.1);
                update_dense_local(&param, &mut acc, &grad, &HYPER, use_locking);
                (param.to_tensor(), acc)
            })
            .collect();

        assert_eq!(results[0], results[1]);
    }

    #[test]
    fn locking_mode_doesnt_change_sparse_results() {
        let values = Tensor::new([3, 2], vec![1., -1., 0.5, 2., -3., 0.25]).unwrap();
        let grad = SparseGradient::new(vec![4, 0, 4], values).unwrap();

        let results: Vec<_> = [true, false]
            .into_iter()
            .map(|use_locking| {
                let param = Parameter::new("emb", Tensor::full([5, 2], 0.));
                let mut acc = AccumulatorPair::for_parameter(&param, 0.1);
                update_sparse_local(&param, &mut acc, &grad, &HYPER, use_locking);
                (param.to_tensor(), acc)
            })
            .collect();

        assert_eq!(results[0], results[1]);
        assert_eq!(&results[0].0.as_slice()[2..8], &[0.; 6]);
    }
}
