//! Active-set tracker.
//!
//! Maps each tracked service to the address it is believed to be registered
//! with. Memory only; a restart starts empty and the watch source's initial
//! listing fills it again. Owned by the reconciler and never shared, so there is
//! no locking.

use std::collections::HashMap;

use crate::model::ServiceIdentity;

#[derive(Debug, Default)]
pub struct ActiveSet {
    entries: HashMap<ServiceIdentity, String>,
}

impl ActiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ServiceIdentity) -> Option<&str> {
        self.entries.get(id).map(String::as_str)
    }

    /// Insert or overwrite; returns the previous address.
    pub fn put(&mut self, id: ServiceIdentity, address: String) -> Option<String> {
        self.entries.insert(id, address)
    }

    pub fn remove(&mut self, id: &ServiceIdentity) -> Option<String> {
        self.entries.remove(id)
    }

    pub fn contains(&self, id: &ServiceIdentity) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ServiceIdentity, &str)> {
        self.entries.iter().map(|(id, addr)| (id, addr.as_str()))
    }
}
