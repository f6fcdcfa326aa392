//! An in-process parameter server for server resident FTRL parameters.
//!
//! [`ParameterServer`] implements [`ftrl::PsTransport`], so it can be handed to an
//! [`ftrl::Ftrl`] optimizer directly.

mod error;
mod server;
mod storage;

pub use error::{Result, ServerErr};
pub use server::ParameterServer;
pub use storage::EntrySnapshot;
