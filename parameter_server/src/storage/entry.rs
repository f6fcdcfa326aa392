use ftrl::{PushPayload, PushRequest, RouteKey, Shape, Tensor, kernel};
use parking_lot::{Mutex, RwLock};

use crate::error::{Result, ServerErr};

#[derive(Debug)]
struct Accumulators {
    moment: Box<[f32]>,
    linear: Box<[f32]>,
}

/// A copy of the whole server side state of one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySnapshot {
    pub weights: Tensor,
    pub moment: Tensor,
    pub linear: Tensor,
}

/// The authoritative state of a server resident parameter.
///
/// Updates hold the accumulators' mutex and the weights' write lock for their whole duration,
/// pulls only take the read lock.
#[derive(Debug)]
pub struct ParamEntry {
    shape: Shape,
    weights: RwLock<Box<[f32]>>,
    acc: Mutex<Accumulators>,
}

impl ParamEntry {
    /// Creates a new `ParamEntry`.
    ///
    /// # Arguments
    /// * `weights` - The initial state of the parameter.
    /// * `initial_accum` - The starting value of the squared gradient accumulator.
    ///
    /// # Returns
    /// A new `ParamEntry` instance.
    pub fn new(weights: Tensor, initial_accum: f32) -> Self {
        let shape = weights.shape().clone();
        let numel = shape.numel();

        Self {
            shape,
            weights: RwLock::new(weights.into_data()),
            acc: Mutex::new(Accumulators {
                moment: vec![initial_accum; numel].into_boxed_slice(),
                linear: vec![0.; numel].into_boxed_slice(),
            }),
        }
    }

    /// Checks `req` against this entry and applies it.
    ///
    /// # Arguments
    /// * `req` - A push addressed to this entry.
    ///
    /// # Returns
    /// A `ServerErr` describing the first inconsistency between the request and the entry,
    /// nothing is modified in that case.
    pub fn apply(&self, req: &PushRequest<'_>) -> Result<()> {
        self.check(req)?;

        let mut acc = self.acc.lock();
        let Accumulators { moment, linear } = &mut *acc;
        let mut weights = self.weights.write();

        match req.payload {
            PushPayload::Dense { grad } => {
                kernel::apply_dense(&mut weights, moment, linear, grad, &req.hyper);
            }
            PushPayload::Sparse { values, indices } => {
                // SAFETY: `check` rejects sparse pushes to scalars.
                let row_len = self.shape.row_len().unwrap();
                kernel::apply_sparse(
                    &mut weights,
                    moment,
                    linear,
                    indices,
                    values,
                    row_len,
                    &req.hyper,
                );
            }
        }

        Ok(())
    }

    fn check(&self, req: &PushRequest<'_>) -> Result<()> {
        let key = req.key;
        let shape_err = || ServerErr::ShapeMismatch {
            key: key.clone(),
            got: req.shapes.clone(),
            expected: self.shape.clone(),
        };

        let (state, extra) = req.shapes.split_at(req.shapes.len().min(3));
        if state.len() != 3 || state.iter().any(|shape| *shape != self.shape) {
            return Err(shape_err());
        }

        match req.payload {
            PushPayload::Dense { grad } => {
                if !extra.is_empty() {
                    return Err(shape_err());
                }

                self.check_len(key, grad.len(), self.shape.numel())
            }
            PushPayload::Sparse { values, indices } => {
                let (Some(rows), Some(row_len)) = (self.shape.rows(), self.shape.row_len()) else {
                    return Err(shape_err());
                };

                let [values_shape, indices_shape] = extra else {
                    return Err(shape_err());
                };

                if values_shape.rows() != Some(indices.len())
                    || values_shape.row_dims() != self.shape.row_dims()
                    || indices_shape.dims() != [indices.len()]
                {
                    return Err(shape_err());
                }

                self.check_len(key, values.len(), indices.len() * row_len)?;

                match indices.iter().find(|&&index| index >= rows) {
                    Some(&index) => Err(ServerErr::IndexOutOfBounds {
                        key: key.clone(),
                        index,
                    }),
                    None => Ok(()),
                }
            }
        }
    }

    fn check_len(&self, key: &RouteKey, got: usize, expected: usize) -> Result<()> {
        if got != expected {
            return Err(ServerErr::SizeMismatch {
                key: key.clone(),
                got,
                expected,
            });
        }

        Ok(())
    }

    /// Copies the entry's weights into `out`.
    ///
    /// # Arguments
    /// * `key` - The route key of this entry, for error reporting.
    /// * `out` - A mutable slice where the weights will be copied.
    ///
    /// # Returns
    /// A `SizeMismatch` error if `out` isn't exactly as long as the parameter.
    pub fn pull_weights(&self, key: &RouteKey, out: &mut [f32]) -> Result<()> {
        self.check_len(key, out.len(), self.shape.numel())?;

        let weights = self.weights.read();
        out.copy_from_slice(&weights);
        Ok(())
    }

    /// Copies the weights and both accumulators.
    pub fn snapshot(&self) -> EntrySnapshot {
        let acc = self.acc.lock();
        let weights = self.weights.read();

        let tensor = |data: &[f32]| {
            // SAFETY: Every buffer of the entry holds exactly `shape.numel()` elements.
            Tensor::new(self.shape.clone(), data.to_vec()).unwrap()
        };

        EntrySnapshot {
            weights: tensor(&weights),
            moment: tensor(&acc.moment),
            linear: tensor(&acc.linear),
        }
    }

    #[cfg(test)]
    pub(crate) fn weights(&self) -> Vec<f32> {
        self.weights.read().to_vec()
    }
}
