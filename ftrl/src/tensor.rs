use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::error::{FtrlErr, Result};

/// The dimensions of a row-major tensor.
///
/// Dimension `0` indexes rows, a scalar (no dimensions) holds a single element and has no rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Shape(Vec<usize>);

impl Shape {
    /// Creates a new `Shape`.
    ///
    /// # Arguments
    /// * `dims` - The size of every dimension, outermost first.
    ///
    /// # Returns
    /// A new `Shape` instance.
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Self(dims.into())
    }

    /// The shape of a scalar.
    pub fn scalar() -> Self {
        Self(Vec::new())
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Returns the amount of elements a tensor of this shape holds.
    pub fn numel(&self) -> usize {
        self.0.iter().product()
    }

    /// Returns the amount of rows, `None` for scalars.
    pub fn rows(&self) -> Option<usize> {
        self.0.first().copied()
    }

    /// Returns the amount of elements per row, `None` for scalars.
    pub fn row_len(&self) -> Option<usize> {
        self.0.first().map(|_| self.0[1..].iter().product())
    }

    /// Returns the dimensions of a single row.
    pub fn row_dims(&self) -> &[usize] {
        self.0.get(1..).unwrap_or_default()
    }
}

impl Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(value: [usize; N]) -> Self {
        Self(value.to_vec())
    }
}

/// A flat row-major `f32` buffer together with its shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Shape,
    data: Box<[f32]>,
}

impl Tensor {
    /// Creates a new `Tensor`.
    ///
    /// # Arguments
    /// * `shape` - The shape of the tensor.
    /// * `data` - The row-major elements.
    ///
    /// # Returns
    /// A new `Tensor` or an error if `data` doesn't hold exactly `shape.numel()` elements.
    pub fn new(shape: impl Into<Shape>, data: Vec<f32>) -> Result<Self> {
        let shape = shape.into();

        if shape.numel() != data.len() {
            return Err(FtrlErr::BufferLength {
                shape,
                got: data.len(),
            });
        }

        Ok(Self {
            shape,
            data: data.into_boxed_slice(),
        })
    }

    /// Creates a new `Tensor` with every element set to `value`.
    pub fn full(shape: impl Into<Shape>, value: f32) -> Self {
        let shape = shape.into();
        let data = vec![value; shape.numel()].into_boxed_slice();
        Self { shape, data }
    }

    /// Creates a single element tensor of shape `[]`.
    pub fn scalar(value: f32) -> Self {
        Self {
            shape: Shape::scalar(),
            data: Box::new([value]),
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Consumes the tensor returning its flat buffer.
    pub fn into_data(self) -> Box<[f32]> {
        self.data
    }
}
