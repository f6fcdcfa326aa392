use crate::{
    error::{FtrlErr, Result},
    parameter::Parameter,
    tensor::{Shape, Tensor},
};

/// A gradient restricted to a subset of rows of its parameter.
///
/// `values` holds one row per entry of `indices`, positionally aligned. Indices may repeat.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseGradient {
    indices: Box<[usize]>,
    values: Tensor,
}

impl SparseGradient {
    /// Creates a new `SparseGradient`.
    ///
    /// # Arguments
    /// * `indices` - The row indices, in application order.
    /// * `values` - A tensor of shape `[indices.len(), row dims...]`.
    ///
    /// # Returns
    /// A new `SparseGradient` or a `BufferLength` error if `values` doesn't have one row per index.
    pub fn new(indices: Vec<usize>, values: Tensor) -> Result<Self> {
        if values.shape().rows() != Some(indices.len()) {
            return Err(FtrlErr::BufferLength {
                shape: values.shape().clone(),
                got: indices.len(),
            });
        }

        Ok(Self {
            indices: indices.into_boxed_slice(),
            values,
        })
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn values(&self) -> &Tensor {
        &self.values
    }

    pub(crate) fn values_mut(&mut self) -> &mut [f32] {
        self.values.as_mut_slice()
    }

    /// Borrows the indices together with the mutable values.
    pub(crate) fn split_mut(&mut self) -> (&[usize], &mut [f32]) {
        (&self.indices, self.values.as_mut_slice())
    }

    /// The shape of the indices tensor, as sent to a parameter server.
    pub fn indices_shape(&self) -> Shape {
        Shape::new([self.indices.len()])
    }
}

/// The gradient of a single parameter for one step.
#[derive(Debug, Clone, PartialEq)]
pub enum Gradient {
    Dense(Tensor),
    Sparse(SparseGradient),
}

impl Gradient {
    /// Creates a sparse gradient, see `SparseGradient::new`.
    pub fn sparse(indices: Vec<usize>, values: Tensor) -> Result<Self> {
        SparseGradient::new(indices, values).map(Self::Sparse)
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, Gradient::Sparse(_))
    }

    /// Checks this gradient can be applied to `param`.
    ///
    /// # Returns
    /// A shape error describing the first incompatibility found.
    pub fn check_against(&self, param: &Parameter) -> Result<()> {
        match self {
            Gradient::Dense(grad) => {
                if grad.shape() != param.shape() {
                    return Err(FtrlErr::ShapeMismatch {
                        param: param.name().to_string(),
                        got: grad.shape().clone(),
                        expected: param.shape().clone(),
                    });
                }
            }
            Gradient::Sparse(grad) => {
                let Some(rows) = param.shape().rows() else {
                    return Err(FtrlErr::NotRowIndexable {
                        param: param.name().to_string(),
                    });
                };

                if grad.values.shape().row_dims() != param.shape().row_dims() {
                    return Err(FtrlErr::ShapeMismatch {
                        param: param.name().to_string(),
                        got: grad.values.shape().clone(),
                        expected: param.shape().clone(),
                    });
                }

                if let Some(&index) = grad.indices.iter().find(|&&i| i >= rows) {
                    return Err(FtrlErr::IndexOutOfBounds {
                        param: param.name().to_string(),
                        index,
                        rows,
                    });
                }
            }
        }

        Ok(())
    }
}

impl From<Tensor> for Gradient {
    fn from(value: Tensor) -> Self {
        Self::Dense(value)
    }
}

impl From<SparseGradient> for Gradient {
    fn from(value: SparseGradient) -> Self {
        Self::Sparse(value)
    }
}
