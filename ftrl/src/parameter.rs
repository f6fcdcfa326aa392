use std::{fmt, sync::Arc};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};

use crate::{
    error::{FtrlErr, Result},
    tensor::{Shape, Tensor},
};

/// The name every push channel of this optimizer is registered under.
pub const OPTIMIZER_NAME: &str = "ftrl";

#[derive(Debug)]
struct ParamInner {
    name: String,
    shape: Shape,
    server_resident: bool,
    weights: RwLock<Box<[f32]>>,
}

/// A named, mutable tensor owned by the training system.
///
/// Cloning a `Parameter` clones the handle, not the data: the optimizer keeps one handle
/// to update the weights in place while the owner keeps another one to read them.
#[derive(Clone)]
pub struct Parameter(Arc<ParamInner>);

impl Parameter {
    /// Creates a new locally resident `Parameter`.
    ///
    /// # Arguments
    /// * `name` - A name, unique among the parameters bound to a single optimizer.
    /// * `init` - The initial value of the parameter.
    ///
    /// # Returns
    /// A new `Parameter` instance.
    pub fn new(name: impl Into<String>, init: Tensor) -> Self {
        Self::with_residency(name, init, false)
    }

    /// Creates a new `Parameter` whose authoritative state lives on a parameter server.
    pub fn server_resident(name: impl Into<String>, init: Tensor) -> Self {
        Self::with_residency(name, init, true)
    }

    fn with_residency(name: impl Into<String>, init: Tensor, server_resident: bool) -> Self {
        let shape = init.shape().clone();

        Self(Arc::new(ParamInner {
            name: name.into(),
            shape,
            server_resident,
            weights: RwLock::new(init.into_data()),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn shape(&self) -> &Shape {
        &self.0.shape
    }

    /// Whether the parameter is updated through a parameter server.
    pub fn is_server_resident(&self) -> bool {
        self.0.server_resident
    }

    /// Locks the weights for reading, blocking while an update holds the write lock.
    pub fn read(&self) -> RwLockReadGuard<'_, Box<[f32]>> {
        self.0.weights.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Box<[f32]>> {
        self.0.weights.write()
    }

    /// Copies the current weights into a new tensor.
    pub fn to_tensor(&self) -> Tensor {
        let data = self.read().to_vec();

        // SAFETY: The weights buffer is created from a tensor of this shape and never resized.
        Tensor::new(self.shape().clone(), data).unwrap()
    }

    /// Overwrites the weights with `src`.
    ///
    /// # Returns
    /// A `BufferLength` error if `src` doesn't hold exactly one value per element.
    pub fn publish(&self, src: &[f32]) -> Result<()> {
        if src.len() != self.shape().numel() {
            return Err(FtrlErr::BufferLength {
                shape: self.shape().clone(),
                got: src.len(),
            });
        }

        self.write().copy_from_slice(src);
        Ok(())
    }

    /// Whether both handles point to the same parameter.
    pub fn ptr_eq(&self, other: &Parameter) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.0.name)
            .field("shape", &self.0.shape)
            .field("server_resident", &self.0.server_resident)
            .finish()
    }
}

/// Identifies the push channel of a server resident parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteKey {
    pub optimizer: String,
    pub param: String,
}

impl RouteKey {
    /// Creates the `RouteKey` for `param` under this optimizer's channel.
    pub fn for_param(param: &Parameter) -> Self {
        Self {
            optimizer: OPTIMIZER_NAME.to_string(),
            param: param.name().to_string(),
        }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.optimizer, self.param)
    }
}

/// Where a bound parameter's authoritative state lives, resolved once at bind time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Residency {
    Local,
    Server(RouteKey),
}

impl Residency {
    /// Resolves the residency of `param` from its routing flag.
    pub fn of(param: &Parameter) -> Self {
        if param.is_server_resident() {
            Self::Server(RouteKey::for_param(param))
        } else {
            Self::Local
        }
    }
}
