//! Service identity, observations, and classified watch events.

use std::fmt;

/// (namespace, name) of a cluster service. Immutable once derived.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceIdentity {
    namespace: String,
    name: String,
}

impl ServiceIdentity {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registry hostnames for this service.
    ///
    /// Always `<name>-<namespace>`, first. Services in `default_namespace` are
    /// also published under the bare `<name>`.
    pub fn hostnames(&self, default_namespace: &str) -> Vec<String> {
        let mut hostnames = vec![format!("{}-{}", self.name, self.namespace)];
        if self.namespace == default_namespace {
            hostnames.push(self.name.clone());
        }
        hostnames
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Observed state of a cluster service: its identity plus every externally
/// reachable address it currently publishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceObservation {
    pub identity: ServiceIdentity,
    pub addresses: Vec<String>,
}

impl ServiceObservation {
    pub fn new(identity: ServiceIdentity, addresses: Vec<String>) -> Self {
        Self {
            identity,
            addresses,
        }
    }

    /// The address, when exactly one is published.
    pub fn single_address(&self) -> Option<&str> {
        match self.addresses.as_slice() {
            [address] => Some(address.as_str()),
            _ => None,
        }
    }
}

/// A classified change delivered by the watch source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Add(ServiceObservation),
    Update {
        old: ServiceObservation,
        new: ServiceObservation,
    },
    Delete(ServiceObservation),
}

impl WatchEvent {
    pub fn identity(&self) -> &ServiceIdentity {
        match self {
            WatchEvent::Add(obs) | WatchEvent::Delete(obs) => &obs.identity,
            WatchEvent::Update { new, .. } => &new.identity,
        }
    }
}
