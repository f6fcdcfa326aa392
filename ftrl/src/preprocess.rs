use crate::{gradient::Gradient, parameter::Parameter};

/// Transforms the raw gradients of a step before they reach the update rule.
///
/// Implementations receive gradients already validated against their parameters.
pub trait GradientPreprocessor: Send + Sync {
    /// Applies weight decay and then loss scale correction.
    ///
    /// # Arguments
    /// * `grads` - One gradient per parameter, modified in place.
    /// * `params` - The parameters, in the same order as `grads`.
    fn decay_then_scale(&self, grads: &mut [Gradient], params: &[Parameter]);
}

/// Leaves gradients untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPreprocessing;

impl GradientPreprocessor for NoPreprocessing {
    fn decay_then_scale(&self, _grads: &mut [Gradient], _params: &[Parameter]) {}
}

/// Adds `weight_decay * weight` to every gradient and then undoes the loss scaling.
#[derive(Debug, Clone, Copy)]
pub struct DecayThenScale {
    weight_decay: f32,
    loss_scale: f32,
}

impl DecayThenScale {
    /// Creates a new `DecayThenScale` preprocessor.
    ///
    /// # Arguments
    /// * `weight_decay` - The decay coefficient, `0` disables it.
    /// * `loss_scale` - The factor the loss was multiplied by, `1` disables the correction.
    ///
    /// # Returns
    /// A new `DecayThenScale` instance.
    pub fn new(weight_decay: f32, loss_scale: f32) -> Self {
        Self {
            weight_decay,
            loss_scale,
        }
    }

    fn decay(&self, grad: &mut Gradient, param: &Parameter) {
        let wd = self.weight_decay;
        let weights = param.read();

        match grad {
            Gradient::Dense(grad) => grad
                .as_mut_slice()
                .iter_mut()
                .zip(weights.iter())
                .for_each(|(g, w)| *g += wd * w),
            Gradient::Sparse(grad) => {
                let row_len = param.shape().row_len().unwrap_or(1);
                if row_len == 0 {
                    return;
                }

                let (indices, values) = grad.split_mut();
                for (&index, row) in indices.iter().zip(values.chunks_exact_mut(row_len)) {
                    let weights_row = &weights[index * row_len..(index + 1) * row_len];
                    row.iter_mut()
                        .zip(weights_row)
                        .for_each(|(g, w)| *g += wd * w);
                }
            }
        }
    }

    fn scale(&self, grad: &mut Gradient) {
        let reciprocal = 1. / self.loss_scale;

        let values = match grad {
            Gradient::Dense(grad) => grad.as_mut_slice(),
            Gradient::Sparse(grad) => grad.values_mut(),
        };

        values.iter_mut().for_each(|g| *g *= reciprocal);
    }
}

impl GradientPreprocessor for DecayThenScale {
    fn decay_then_scale(&self, grads: &mut [Gradient], params: &[Parameter]) {
        if self.weight_decay > 0. {
            grads
                .iter_mut()
                .zip(params)
                .for_each(|(grad, param)| self.decay(grad, param));
        }

        if self.loss_scale != 1. {
            grads.iter_mut().for_each(|grad| self.scale(grad));
        }
    }
}
