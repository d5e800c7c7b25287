//! lbmirror-core - keeps a service registry in step with cluster load-balancer services
//!
//! Events flow one at a time from the watch source into the [`Reconciler`], which
//! gates them through the applicability filter, consults the [`ActiveSet`], and
//! hands registry work to a [`Dispatcher`].
//!
//! # Modules
//!
//! - [`model`] - Service identity, observations, and classified watch events
//! - [`filter`] - Applicability predicate
//! - [`active_set`] - In-memory record of what is believed registered
//! - [`dispatch`] - Inline or keyed-worker execution of registry calls
//! - [`reconciler`] - Per-identity state machine driven by watch events
//! - [`classifier`] - Turns raw watcher events into add/update/delete

pub mod active_set;
pub mod classifier;
pub mod dispatch;
pub mod filter;
pub mod model;
pub mod reconciler;

#[cfg(test)]
mod testing;

pub use active_set::ActiveSet;
pub use classifier::{EventClassifier, SourceEvent};
pub use dispatch::{Dispatcher, RegistryOp, RegistryWork};
pub use filter::is_applicable;
pub use model::{ServiceIdentity, ServiceObservation, WatchEvent};
pub use reconciler::{Reconciler, ReconcilerConfig};

/// Namespace whose services are also registered under their bare name
pub const DEFAULT_NAMESPACE: &str = "default";
