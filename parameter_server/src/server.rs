use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use ftrl::{Ack, PsTransport, PushRequest, RemoteErr, RouteKey, Tensor, run_cpu_bound};
use log::debug;
use parking_lot::Mutex;

use crate::{
    error::{Result, ServerErr},
    storage::{EntrySnapshot, EntryStore},
};

/// An in-process parameter server holding the authoritative state of server resident
/// parameters.
///
/// A push is applied before it's acknowledged. Only the latest acknowledgement of each route
/// can be pulled, and only once: a newer push to the same route supersedes an unpulled one, so
/// at most one ack per registered parameter is ever pending.
#[derive(Debug, Default)]
pub struct ParameterServer {
    store: EntryStore,
    pending: Mutex<HashMap<RouteKey, u64>>,
    next_seq: AtomicU64,
}

impl ParameterServer {
    /// Creates a new empty `ParameterServer`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the server side state of a parameter.
    ///
    /// # Arguments
    /// * `key` - The route key its pushes will carry.
    /// * `weights` - The initial weights, usually the same the local parameter started with.
    /// * `initial_accum` - The starting value of the squared gradient accumulator.
    ///
    /// # Returns
    /// A `DuplicateRoute` error if `key` is already registered.
    pub fn register(&self, key: RouteKey, weights: Tensor, initial_accum: f32) -> Result<()> {
        debug!(route = key.param.as_str(), numel = weights.len(); "registering parameter");
        self.store.register(key, weights, initial_accum)
    }

    /// Copies the server side state of `key`.
    pub fn snapshot(&self, key: &RouteKey) -> Result<EntrySnapshot> {
        Ok(self.store.get(key)?.snapshot())
    }

    /// The amount of registered parameters.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// The amount of acknowledgements that can still be pulled.
    pub fn pending_acks(&self) -> usize {
        self.pending.lock().len()
    }

    fn apply(&self, req: &PushRequest<'_>) -> Result<Ack> {
        let entry = self.store.get(req.key)?;
        entry.apply(req)?;

        let ack = Ack {
            key: req.key.clone(),
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        };

        debug!(route = req.key.param.as_str(), seq = ack.seq; "applied push");
        if let Some(stale) = self.pending.lock().insert(ack.key.clone(), ack.seq) {
            debug!(route = req.key.param.as_str(), seq = stale; "superseded unpulled ack");
        }
        Ok(ack)
    }

    fn copy_weights(&self, ack: Ack, out: &mut [f32]) -> Result<()> {
        {
            let mut pending = self.pending.lock();
            if pending.get(&ack.key) != Some(&ack.seq) {
                return Err(ServerErr::UnknownAck(ack));
            }
            pending.remove(&ack.key);
        }

        self.store.get(&ack.key)?.pull_weights(&ack.key, out)
    }
}

impl PsTransport for ParameterServer {
    async fn push(&self, req: PushRequest<'_>) -> std::result::Result<Ack, RemoteErr> {
        Ok(run_cpu_bound(|| self.apply(&req))?)
    }

    async fn pull(&self, ack: Ack, out: &mut [f32]) -> std::result::Result<(), RemoteErr> {
        Ok(run_cpu_bound(|| self.copy_weights(ack, out))?)
    }
}
