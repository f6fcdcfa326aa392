//! Generators for the initial values of weights.

mod random;

pub use random::{InitErr, RandParamGen};

use crate::tensor::{Shape, Tensor};

/// A finite source of initial values.
pub trait ParamGen {
    /// Draws up to `n` values.
    ///
    /// # Returns
    /// Fewer than `n` values when close to exhaustion, `None` once exhausted.
    fn sample(&mut self, n: usize) -> Option<Vec<f32>>;

    /// Draws a whole tensor of the given shape.
    ///
    /// # Arguments
    /// * `shape` - The shape of the resulting tensor.
    ///
    /// # Returns
    /// The sampled tensor or `None` if the generator was exhausted before filling it.
    fn sample_tensor(&mut self, shape: Shape) -> Option<Tensor> {
        let numel = shape.numel();
        let mut data = Vec::with_capacity(numel);

        while data.len() < numel {
            let chunk = self.sample(numel - data.len())?;
            data.extend(chunk);
        }

        Tensor::new(shape, data).ok()
    }
}
