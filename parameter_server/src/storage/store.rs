use std::{collections::HashMap, sync::Arc};

use ftrl::{RouteKey, Tensor};
use parking_lot::RwLock;

use super::ParamEntry;
use crate::error::{Result, ServerErr};

/// Every registered entry, indexed by route key.
///
/// Entries are reference counted so the map's lock is released before an entry is updated.
#[derive(Debug, Default)]
pub struct EntryStore {
    entries: RwLock<HashMap<RouteKey, Arc<ParamEntry>>>,
}

impl EntryStore {
    /// Registers a new entry.
    ///
    /// # Arguments
    /// * `key` - The route key pushes to this entry will carry.
    /// * `weights` - The initial weights.
    /// * `initial_accum` - The starting value of the squared gradient accumulator.
    ///
    /// # Returns
    /// A `DuplicateRoute` error if `key` is already registered.
    pub fn register(&self, key: RouteKey, weights: Tensor, initial_accum: f32) -> Result<()> {
        let mut entries = self.entries.write();

        if entries.contains_key(&key) {
            return Err(ServerErr::DuplicateRoute(key));
        }

        entries.insert(key, Arc::new(ParamEntry::new(weights, initial_accum)));
        Ok(())
    }

    /// Looks up the entry of `key`.
    pub fn get(&self, key: &RouteKey) -> Result<Arc<ParamEntry>> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| ServerErr::UnknownRoute(key.clone()))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
