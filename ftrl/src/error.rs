use std::{
    error::Error,
    fmt::{self, Display},
};

use crate::tensor::Shape;

/// The result type used across the ftrl crate.
pub type Result<T> = std::result::Result<T, FtrlErr>;

/// The ftrl crate's error type.
#[derive(Debug)]
pub enum FtrlErr {
    InvalidHyperparameter {
        name: &'static str,
        value: f32,
        constraint: &'static str,
    },
    UnsupportedLearningRate(&'static str),
    Config(serde_json::Error),
    BufferLength {
        shape: Shape,
        got: usize,
    },
    GradientCount {
        got: usize,
        expected: usize,
    },
    ShapeMismatch {
        param: String,
        got: Shape,
        expected: Shape,
    },
    IndexOutOfBounds {
        param: String,
        index: usize,
        rows: usize,
    },
    NotRowIndexable {
        param: String,
    },
    DuplicateParameter {
        param: String,
    },
}

impl Display for FtrlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FtrlErr::InvalidHyperparameter {
                name,
                value,
                constraint,
            } => write!(f, "invalid hyperparameter {name} = {value}, must be {constraint}"),
            FtrlErr::UnsupportedLearningRate(kind) => write!(
                f,
                "{kind} learning rate is not supported, only a single static rate is"
            ),
            FtrlErr::Config(e) => write!(f, "malformed configuration: {e}"),
            FtrlErr::BufferLength { shape, got } => write!(
                f,
                "a buffer of {got} elements can't back a tensor of shape {shape}"
            ),
            FtrlErr::GradientCount { got, expected } => write!(
                f,
                "got {got} gradients for {expected} bound parameters"
            ),
            FtrlErr::ShapeMismatch {
                param,
                got,
                expected,
            } => write!(
                f,
                "gradient shape {got} doesn't match parameter {param} of shape {expected}"
            ),
            FtrlErr::IndexOutOfBounds { param, index, rows } => write!(
                f,
                "sparse index {index} is out of bounds for parameter {param} with {rows} rows"
            ),
            FtrlErr::NotRowIndexable { param } => write!(
                f,
                "parameter {param} is a scalar and can't receive a sparse gradient"
            ),
            FtrlErr::DuplicateParameter { param } => {
                write!(f, "parameter {param} was bound more than once")
            }
        }
    }
}

impl Error for FtrlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FtrlErr::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for FtrlErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Config(value)
    }
}

/// Error returned by a parameter-server transport whenever a push or a pull
/// couldn't be completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteErr(String);

impl RemoteErr {
    /// Creates a new `RemoteErr`.
    ///
    /// # Arguments
    /// * `detail` - A human readable description of the failure.
    ///
    /// # Returns
    /// A new `RemoteErr` instance.
    pub fn new(detail: impl Into<String>) -> Self {
        Self(detail.into())
    }
}

impl Display for RemoteErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parameter server error: {}", self.0)
    }
}

impl Error for RemoteErr {}
