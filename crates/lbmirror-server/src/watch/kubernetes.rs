//! Kubernetes `Service` watch source.
//!
//! Wraps a `kube` watcher and turns each object into a [`ServiceObservation`].

use std::path::Path;

use futures::{Stream, StreamExt, future};
use k8s_openapi::api::core::v1::Service;
use kube::config::{InferConfigError, KubeConfigOptions, Kubeconfig, KubeconfigError};
use kube::runtime::WatchStreamExt;
use kube::runtime::watcher::{self, Event};
use kube::{Api, Client, Config};
use lbmirror_core::{DEFAULT_NAMESPACE, ServiceIdentity, ServiceObservation, SourceEvent};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("failed to read kubeconfig: {0}")]
    Kubeconfig(#[from] KubeconfigError),

    #[error("failed to infer cluster configuration: {0}")]
    Infer(#[from] InferConfigError),

    #[error("failed to create kubernetes client: {0}")]
    Client(#[from] kube::Error),
}

/// Which services to watch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchConfig {
    /// Namespace to watch; `None` watches all namespaces
    pub namespace: Option<String>,
    pub label_selector: Option<String>,
}

/// Build a client from an explicit kubeconfig, or infer one (in-cluster first,
/// then the local kubeconfig).
pub async fn connect(kubeconfig: Option<&Path>) -> Result<Client, WatchError> {
    let config = match kubeconfig {
        Some(path) => {
            info!(path = %path.display(), "Loading kubeconfig");
            let kubeconfig = Kubeconfig::read_from(path)?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?
        }
        None => Config::infer().await?,
    };

    debug!(cluster_url = %config.cluster_url, "Kubernetes client configured");
    Ok(Client::try_from(config)?)
}

/// Single load-balancer address candidates, IP preferred over hostname.
fn ingress_addresses(svc: &Service) -> Vec<String> {
    svc.status
        .as_ref()
        .and_then(|status| status.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .map(|ingress| {
            ingress
                .iter()
                .filter_map(|entry| {
                    entry
                        .ip
                        .as_deref()
                        .filter(|ip| !ip.is_empty())
                        .or(entry.hostname.as_deref().filter(|h| !h.is_empty()))
                        .map(str::to_string)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Convert a `Service` object. Returns `None` for objects without a name.
pub fn observe(svc: &Service) -> Option<ServiceObservation> {
    let name = svc.metadata.name.as_deref().filter(|n| !n.is_empty())?;
    let namespace = svc
        .metadata
        .namespace
        .as_deref()
        .filter(|ns| !ns.is_empty())
        .unwrap_or(DEFAULT_NAMESPACE);

    Some(ServiceObservation::new(
        ServiceIdentity::new(namespace, name),
        ingress_addresses(svc),
    ))
}

pub fn to_source_event(event: Event<Service>) -> Option<SourceEvent> {
    match event {
        Event::Init => Some(SourceEvent::Init),
        Event::InitDone => Some(SourceEvent::InitDone),
        Event::InitApply(svc) => observe(&svc).map(SourceEvent::InitApply),
        Event::Apply(svc) => observe(&svc).map(SourceEvent::Apply),
        Event::Delete(svc) => observe(&svc).map(SourceEvent::Delete),
    }
}

/// Stream of source events for the configured services.
///
/// Reconnects with the default backoff; errors are yielded so the consumer can
/// log them, and the stream keeps going afterwards.
pub fn service_events(
    client: Client,
    config: &WatchConfig,
) -> impl Stream<Item = Result<SourceEvent, watcher::Error>> + Send + Unpin + 'static {
    let api: Api<Service> = match &config.namespace {
        Some(namespace) => Api::namespaced(client, namespace),
        None => Api::all(client),
    };

    let watcher_config = match &config.label_selector {
        Some(selector) => watcher::Config::default().labels(selector),
        None => watcher::Config::default(),
    };

    info!(
        namespace = config.namespace.as_deref().unwrap_or("<all>"),
        label_selector = config.label_selector.as_deref().unwrap_or(""),
        "Starting Kubernetes service watcher"
    );

    watcher::watcher(api, watcher_config)
        .default_backoff()
        .filter_map(|result| future::ready(result.map(to_source_event).transpose()))
        .boxed()
}
