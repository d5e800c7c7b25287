//! Classification of raw watcher events.
//!
//! A list/watch stream reports "this object now looks like X" without the
//! previous state, and re-lists everything after every (re)connect. The
//! classifier remembers the last observation per identity so it can emit
//! add/update/delete, and detects objects that disappeared while the watch was
//! down by diffing a completed re-list against what it knew before.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::model::{ServiceIdentity, ServiceObservation, WatchEvent};

/// Raw event shapes produced by a list/watch source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// A re-list started
    Init,
    /// An object delivered as part of the re-list
    InitApply(ServiceObservation),
    /// The re-list finished
    InitDone,
    /// An object was created or modified
    Apply(ServiceObservation),
    /// An object was deleted
    Delete(ServiceObservation),
}

#[derive(Debug, Default)]
pub struct EventClassifier {
    known: HashMap<ServiceIdentity, ServiceObservation>,
    relisted: Option<HashSet<ServiceIdentity>>,
}

impl EventClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn known_len(&self) -> usize {
        self.known.len()
    }

    pub fn classify(&mut self, event: SourceEvent) -> Vec<WatchEvent> {
        match event {
            SourceEvent::Init => {
                debug!(known = self.known.len(), "Re-list started");
                self.relisted = Some(HashSet::new());
                Vec::new()
            }
            SourceEvent::InitApply(obs) => {
                if let Some(relisted) = self.relisted.as_mut() {
                    relisted.insert(obs.identity.clone());
                }
                vec![self.apply(obs)]
            }
            SourceEvent::Apply(obs) => vec![self.apply(obs)],
            SourceEvent::Delete(obs) => {
                let last = self.known.remove(&obs.identity).unwrap_or(obs);
                vec![WatchEvent::Delete(last)]
            }
            SourceEvent::InitDone => self.finish_relist(),
        }
    }

    /// Re-deliver every known observation unchanged.
    pub fn resync(&self) -> Vec<WatchEvent> {
        let mut observations: Vec<&ServiceObservation> = self.known.values().collect();
        observations.sort_by(|a, b| a.identity.cmp(&b.identity));
        observations
            .into_iter()
            .map(|obs| WatchEvent::Update {
                old: obs.clone(),
                new: obs.clone(),
            })
            .collect()
    }

    fn apply(&mut self, obs: ServiceObservation) -> WatchEvent {
        match self.known.insert(obs.identity.clone(), obs.clone()) {
            Some(old) => WatchEvent::Update { old, new: obs },
            None => WatchEvent::Add(obs),
        }
    }

    fn finish_relist(&mut self) -> Vec<WatchEvent> {
        let Some(relisted) = self.relisted.take() else {
            return Vec::new();
        };

        let mut gone: Vec<ServiceIdentity> = self
            .known
            .keys()
            .filter(|id| !relisted.contains(*id))
            .cloned()
            .collect();
        gone.sort();

        if !gone.is_empty() {
            info!(count = gone.len(), "Services disappeared during re-list");
        }

        gone.into_iter()
            .filter_map(|id| self.known.remove(&id))
            .map(WatchEvent::Delete)
            .collect()
    }
}
