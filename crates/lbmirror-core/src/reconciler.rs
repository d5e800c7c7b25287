//! Delta reconciler.
//!
//! Per identity the state is either untracked or tracked with an address, and it
//! lives entirely in the [`ActiveSet`]. Handlers decide the transition, hand the
//! registry calls to the [`Dispatcher`] and then record the new state. The
//! record is updated even when the registry calls end up failing; a later event
//! or resync is what brings the two back together.

use tracing::{debug, info};

use crate::DEFAULT_NAMESPACE;
use crate::active_set::ActiveSet;
use crate::dispatch::{Dispatcher, RegistryWork};
use crate::filter::is_applicable;
use crate::model::{ServiceIdentity, ServiceObservation, WatchEvent};

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Services here are also registered under their bare name
    pub default_namespace: String,
    /// Deregister a tracked service whose update makes it inapplicable.
    /// Off by default: such entries are left registered.
    pub prune_inapplicable: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            default_namespace: DEFAULT_NAMESPACE.to_string(),
            prune_inapplicable: false,
        }
    }
}

pub struct Reconciler {
    config: ReconcilerConfig,
    active: ActiveSet,
    dispatcher: Dispatcher,
}

impl Reconciler {
    pub fn new(config: ReconcilerConfig, dispatcher: Dispatcher) -> Self {
        Self {
            config,
            active: ActiveSet::new(),
            dispatcher,
        }
    }

    pub fn active_set(&self) -> &ActiveSet {
        &self.active
    }

    pub async fn handle(&mut self, event: WatchEvent) {
        match event {
            WatchEvent::Add(obs) => self.on_add(&obs).await,
            WatchEvent::Update { old, new } => self.on_update(&old, &new).await,
            WatchEvent::Delete(obs) => self.on_delete(&obs).await,
        }
    }

    pub async fn on_add(&mut self, observation: &ServiceObservation) {
        self.track(observation).await;
    }

    /// Only the current tracked state and the new observation matter; `old` is
    /// kept for logging.
    pub async fn on_update(&mut self, old: &ServiceObservation, new: &ServiceObservation) {
        debug!(
            service = %new.identity,
            old_addresses = ?old.addresses,
            new_addresses = ?new.addresses,
            "Service updated"
        );

        if !is_applicable(new) && self.active.contains(&new.identity) {
            if self.config.prune_inapplicable {
                self.untrack(&new.identity).await;
            } else {
                debug!(
                    service = %new.identity,
                    addresses = new.addresses.len(),
                    "Tracked service no longer has a single address, leaving it registered"
                );
            }
            return;
        }

        self.track(new).await;
    }

    pub async fn on_delete(&mut self, observation: &ServiceObservation) {
        if !self.active.contains(&observation.identity) {
            debug!(service = %observation.identity, "Ignoring delete of untracked service");
            return;
        }
        self.untrack(&observation.identity).await;
    }

    /// Untracked or tracked with another address: register and record.
    async fn track(&mut self, observation: &ServiceObservation) {
        let Some(address) = observation.single_address() else {
            debug!(
                service = %observation.identity,
                addresses = observation.addresses.len(),
                "Skipping service without exactly one address"
            );
            return;
        };

        let identity = &observation.identity;
        if self.active.get(identity) == Some(address) {
            debug!(service = %identity, address = %address, "Address unchanged");
            return;
        }

        let hostnames = identity.hostnames(&self.config.default_namespace);
        info!(
            service = %identity,
            address = %address,
            previous = ?self.active.get(identity),
            hostnames = ?hostnames,
            "Registering service"
        );
        self.dispatcher
            .dispatch(RegistryWork::register(identity.clone(), hostnames, address))
            .await;
        self.active.put(identity.clone(), address.to_string());
    }

    async fn untrack(&mut self, identity: &ServiceIdentity) {
        let hostnames = identity.hostnames(&self.config.default_namespace);
        info!(service = %identity, hostnames = ?hostnames, "Deregistering service");
        self.dispatcher
            .dispatch(RegistryWork::deregister(identity.clone(), hostnames))
            .await;
        self.active.remove(identity);
    }

    /// Drain outstanding registry work.
    pub async fn shutdown(self) {
        info!(tracked = self.active.len(), "Stopping reconciler");
        self.dispatcher.shutdown().await;
    }
}
