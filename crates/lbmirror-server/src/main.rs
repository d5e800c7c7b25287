//! Main entry point for lbmirror.
//!
//! Watches Kubernetes services and mirrors those with a single load-balancer
//! address into the local Consul agent.

use std::sync::Arc;

use anyhow::Context;
use lbmirror_consul_client::{ConsulClient, RegistryClient};
use lbmirror_core::{Dispatcher, Reconciler};
use lbmirror_server::{config::Configuration, runner, startup, watch};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let configuration = Configuration::new().context("Failed to load configuration")?;
    let _logging_guard = startup::init_logging(&configuration.logging_config())?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting lbmirror");

    let client = watch::connect(configuration.kubeconfig().as_deref())
        .await
        .context("Failed to connect to Kubernetes")?;

    let consul_config = configuration.consul_client_config();
    let consul = ConsulClient::new(consul_config.clone())
        .with_context(|| format!("Failed to create Consul client for {}", consul_config.endpoint))?;
    let endpoint = consul.base_url().to_string();
    let registry = RegistryClient::new(Arc::new(consul), configuration.retry_policy());
    info!(
        endpoint = %endpoint,
        max_attempts = registry.policy().max_attempts,
        attempt_wait = ?registry.policy().wait,
        "Consul client configured"
    );

    let dispatcher = Dispatcher::with_workers(
        registry,
        configuration.dispatch_workers(),
        configuration.dispatch_queue_capacity(),
    );
    let reconciler = Reconciler::new(configuration.reconciler_config(), dispatcher);

    let shutdown = startup::wait_for_shutdown_signal();
    let events = watch::service_events(client, &configuration.watch_config());

    runner::run(events, reconciler, configuration.resync_interval(), shutdown).await;

    info!("lbmirror stopped");
    Ok(())
}
