//! FTRL-proximal update engine.
//!
//! Binds a list of [`Parameter`]s to an [`Ftrl`] optimizer which, on every step, applies one
//! gradient per parameter through one of three paths:
//!
//! * dense local, the whole parameter is updated by the dense kernel,
//! * sparse local, only the rows named by the gradient are updated,
//! * server routed, the raw inputs are pushed to a parameter server and the resulting weights
//!   are pulled back into the local parameter.
//!
//! ```no_run
//! # async fn run() -> ftrl::Result<()> {
//! use ftrl::{Ftrl, FtrlConfig, Gradient, NoServer, Parameter, Tensor};
//!
//! let weights = Parameter::new("w", Tensor::full([4], 0.));
//! let mut ftrl = Ftrl::new(vec![weights.clone()], FtrlConfig::default(), NoServer)?;
//!
//! let ok = ftrl.step(vec![Gradient::Dense(Tensor::full([4], 0.5))]).await?;
//! assert!(ok);
//! # Ok(())
//! # }
//! ```

mod accumulator;
mod bridge;
mod config;
mod dispatch;
mod error;
mod gradient;
pub mod initialization;
pub mod kernel;
mod learning_rate;
mod optimizer;
mod parameter;
mod preprocess;
mod runtime;
mod tensor;

pub use accumulator::AccumulatorPair;
pub use bridge::{Ack, NoServer, PsTransport, PushPayload, PushRequest};
pub use config::{FtrlConfig, FtrlSettings, Hyperparams, LearningRateSpec};
pub use dispatch::UpdatePath;
pub use error::{FtrlErr, RemoteErr, Result};
pub use gradient::{Gradient, SparseGradient};
pub use learning_rate::{LearningRate, StaticLr};
pub use optimizer::{Ftrl, FtrlBuilder};
pub use parameter::{OPTIMIZER_NAME, Parameter, Residency, RouteKey};
pub use preprocess::{DecayThenScale, GradientPreprocessor, NoPreprocessing};
pub use runtime::run_cpu_bound;
pub use tensor::{Shape, Tensor};
