use crate::{
    parameter::Parameter,
    tensor::{Shape, Tensor},
};

/// The per parameter auxiliary state of the FTRL update.
///
/// Both tensors always have the shape of the parameter they were allocated for.
#[derive(Debug, Clone, PartialEq)]
pub struct AccumulatorPair {
    moment: Tensor,
    linear: Tensor,
}

impl AccumulatorPair {
    /// Allocates the accumulator pair of `param`.
    ///
    /// `moment` is filled with `initial_accum` and `linear` with zeros, both with the shape of
    /// `param`. The pair is owned by the caller, the parameter is only read for its shape.
    ///
    /// # Arguments
    /// * `param` - The parameter to allocate the state for.
    /// * `initial_accum` - The starting value of the squared gradient accumulator.
    ///
    /// # Returns
    /// A new `AccumulatorPair` instance.
    pub fn for_parameter(param: &Parameter, initial_accum: f32) -> Self {
        Self::with_shape(param.shape().clone(), initial_accum)
    }

    pub(crate) fn with_shape(shape: Shape, initial_accum: f32) -> Self {
        Self {
            moment: Tensor::full(shape.clone(), initial_accum),
            linear: Tensor::full(shape, 0.),
        }
    }

    pub fn moment(&self) -> &Tensor {
        &self.moment
    }

    pub fn linear(&self) -> &Tensor {
        &self.linear
    }

    /// Borrows both accumulators mutably at once.
    pub(crate) fn split_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        (self.moment.as_mut_slice(), self.linear.as_mut_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulators_follow_parameter_shape() {
        let param = Parameter::new("emb", Tensor::full([3, 2], 1.));
        let pair = AccumulatorPair::for_parameter(&param, 0.1);

        assert_eq!(pair.moment().shape(), param.shape());
        assert_eq!(pair.linear().shape(), param.shape());
        assert_eq!(pair.moment().as_slice(), &[0.1; 6]);
        assert_eq!(pair.linear().as_slice(), &[0.; 6]);
    }

    #[test]
    fn scalar_parameter_gets_scalar_accumulators() {
        let param = Parameter::new("bias", Tensor::scalar(2.));
        let pair = AccumulatorPair::for_parameter(&param, 0.);

        assert_eq!(pair.moment(), &Tensor::scalar(0.));
        assert_eq!(pair.linear(), &Tensor::scalar(0.));
    }

    #[test]
    fn empty_parameter_gets_empty_accumulators() {
        let param = Parameter::new("empty", Tensor::full([0, 4], 0.));
        let pair = AccumulatorPair::for_parameter(&param, 0.1);

        assert!(pair.moment().is_empty());
        assert_eq!(pair.moment().shape(), &Shape::from([0, 4]));
    }
}
