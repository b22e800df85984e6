//! Entity and device registry.
//!
//! Records every reading the integration has exposed, keyed by its stable unique id, and the
//! device each one is grouped under. Entries outlive a single setup so readings can be
//! correlated across reconfigurations, and are removed when their symbol stops being tracked
//! or their unique id is no longer produced.

use crate::core::symbols::normalize_symbol;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityEntry {
    pub unique_id: String,
    pub name: String,
    pub symbol: Option<String>,
    pub device_id: Option<String>,
}

#[derive(Debug, Default)]
struct RegistryState {
    entities: BTreeMap<String, EntityEntry>,
    devices: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub struct Registry {
    state: Mutex<RegistryState>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers an entity (and its device) unless one with the same unique id exists.
    /// Returns true when a new entry was created.
    pub fn get_or_create(&self, entry: EntityEntry) -> bool {
        let mut state = self.state();
        if let Some(device_id) = &entry.device_id {
            state.devices.insert(device_id.clone());
        }
        if state.entities.contains_key(&entry.unique_id) {
            return false;
        }
        debug!(unique_id = %entry.unique_id, "Registering entity");
        state.entities.insert(entry.unique_id.clone(), entry);
        true
    }

    pub fn entity(&self, unique_id: &str) -> Option<EntityEntry> {
        self.state().entities.get(unique_id).cloned()
    }

    pub fn entities(&self) -> Vec<EntityEntry> {
        self.state().entities.values().cloned().collect()
    }

    pub fn has_device(&self, device_id: &str) -> bool {
        self.state().devices.contains(device_id)
    }

    pub fn device_count(&self) -> usize {
        self.state().devices.len()
    }

    /// Removes every entity owned by one of `symbols`, along with its device.
    /// Returns the unique ids removed.
    pub fn remove_symbols(&self, symbols: &[String]) -> Vec<String> {
        let symbols: BTreeSet<String> = symbols.iter().map(|s| normalize_symbol(s)).collect();
        let mut state = self.state();

        let doomed: Vec<EntityEntry> = state
            .entities
            .values()
            .filter(|e| e.symbol.as_ref().is_some_and(|s| symbols.contains(s)))
            .cloned()
            .collect();

        for entry in &doomed {
            debug!(unique_id = %entry.unique_id, "Removing entity");
            state.entities.remove(&entry.unique_id);
            if let Some(device_id) = &entry.device_id {
                if state.devices.remove(device_id) {
                    debug!(device_id = %device_id, "Removing device");
                }
            }
        }

        doomed.into_iter().map(|e| e.unique_id).collect()
    }

    /// Removes every entity whose unique id is not in `unique_ids`, then every device no
    /// remaining entity belongs to. Returns the unique ids removed.
    pub fn retain_unique_ids(&self, unique_ids: &[String]) -> Vec<String> {
        let mut state = self.state();

        let stale: Vec<String> = state
            .entities
            .keys()
            .filter(|id| !unique_ids.contains(id))
            .cloned()
            .collect();
        for unique_id in &stale {
            debug!(unique_id = %unique_id, "Removing stale entity");
            state.entities.remove(unique_id);
        }

        let used: BTreeSet<String> = state
            .entities
            .values()
            .filter_map(|e| e.device_id.clone())
            .collect();
        state.devices.retain(|device_id| used.contains(device_id));

        stale
    }
}
