use std::{
    error::Error,
    fmt::{self, Display},
};

use ftrl::{Ack, RemoteErr, RouteKey, Shape};

/// The result type used across the parameter server.
pub type Result<T> = std::result::Result<T, ServerErr>;

/// Error returned by the parameter server on registration, push or pull failures.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerErr {
    UnknownRoute(RouteKey),
    DuplicateRoute(RouteKey),
    UnknownAck(Ack),
    ShapeMismatch {
        key: RouteKey,
        got: Vec<Shape>,
        expected: Shape,
    },
    IndexOutOfBounds {
        key: RouteKey,
        index: usize,
    },
    SizeMismatch {
        key: RouteKey,
        got: usize,
        expected: usize,
    },
}

impl Display for ServerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerErr::UnknownRoute(key) => write!(f, "no parameter registered under {key}"),
            ServerErr::DuplicateRoute(key) => write!(f, "{key} is already registered"),
            ServerErr::UnknownAck(ack) => {
                write!(f, "ack {} of {} is stale or already pulled", ack.seq, ack.key)
            }
            ServerErr::ShapeMismatch { key, got, expected } => write!(
                f,
                "push to {key} declares shapes {got:?}, the registered shape is {expected}"
            ),
            ServerErr::IndexOutOfBounds { key, index } => {
                write!(f, "sparse index {index} is out of bounds for {key}")
            }
            ServerErr::SizeMismatch { key, got, expected } => write!(
                f,
                "buffer of {got} elements for {key}, expected {expected}"
            ),
        }
    }
}

impl Error for ServerErr {}

impl From<ServerErr> for RemoteErr {
    fn from(value: ServerErr) -> Self {
        RemoteErr::new(value.to_string())
    }
}
