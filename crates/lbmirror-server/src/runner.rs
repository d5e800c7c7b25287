//! Consumption loop: the single task that owns the classifier and reconciler.

use std::fmt::Display;
use std::time::Duration;

use futures::{Stream, StreamExt};
use lbmirror_core::{EventClassifier, Reconciler, SourceEvent};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::startup::ShutdownSignal;

/// Drive `reconciler` from `events` until the stream ends or shutdown fires.
///
/// Every `resync` interval the last known state of each service is re-applied.
/// The reconciler's dispatcher is drained before this returns.
pub async fn run<S, E>(
    mut events: S,
    mut reconciler: Reconciler,
    resync: Duration,
    shutdown: ShutdownSignal,
) where
    S: Stream<Item = Result<SourceEvent, E>> + Unpin,
    E: Display,
{
    let mut classifier = EventClassifier::new();
    let mut ticker = tokio::time::interval_at(Instant::now() + resync, resync);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let stopped = shutdown.wait();
    tokio::pin!(stopped);

    info!(resync_seconds = resync.as_secs(), "Reconciler started");

    loop {
        tokio::select! {
            biased;

            _ = &mut stopped => {
                info!("Shutdown requested, stopping reconciler");
                break;
            }
            _ = ticker.tick() => {
                let resynced = classifier.resync();
                debug!(
                    known = resynced.len(),
                    tracked = reconciler.active_set().len(),
                    "Resync"
                );
                for (identity, address) in reconciler.active_set().iter() {
                    trace!(service = %identity, address, "Tracked");
                }
                for event in resynced {
                    reconciler.handle(event).await;
                }
            }
            next = events.next() => match next {
                Some(Ok(source_event)) => {
                    for event in classifier.classify(source_event) {
                        reconciler.handle(event).await;
                    }
                }
                Some(Err(e)) => {
                    warn!("Watch stream error: {}", e);
                }
                None => {
                    warn!("Watch stream ended");
                    break;
                }
            },
        }
    }

    reconciler.shutdown().await;
    info!("Reconciler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use lbmirror_consul_client::{ConsulError, RegistryClient, RetryPolicy, ServiceRegistry};
    use lbmirror_core::{Dispatcher, ReconcilerConfig, ServiceIdentity, ServiceObservation};

    #[derive(Default)]
    struct MemoryRegistry {
        calls: Mutex<Vec<String>>,
    }

    impl MemoryRegistry {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ServiceRegistry for MemoryRegistry {
        async fn register(&self, hostname: &str, address: &str) -> Result<(), ConsulError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("register {hostname} {address}"));
            Ok(())
        }

        async fn deregister(&self, hostname: &str) -> Result<(), ConsulError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("deregister {hostname}"));
            Ok(())
        }
    }

    fn reconciler(registry: Arc<MemoryRegistry>, workers: usize) -> Reconciler {
        let client = RegistryClient::new(registry, RetryPolicy::new(1, Duration::ZERO));
        Reconciler::new(
            ReconcilerConfig::default(),
            Dispatcher::with_workers(client, workers, 8),
        )
    }

    fn obs(namespace: &str, name: &str, address: &str) -> ServiceObservation {
        ServiceObservation::new(
            ServiceIdentity::new(namespace, name),
            vec![address.to_string()],
        )
    }

    #[tokio::test]
    async fn test_runs_events_until_stream_ends() {
        let registry = Arc::new(MemoryRegistry::default());
        let events = futures::stream::iter(vec![
            Ok::<_, String>(SourceEvent::Apply(obs("apps", "api", "10.0.0.1"))),
            Err("connection reset".to_string()),
            Ok(SourceEvent::Delete(obs("apps", "api", "10.0.0.1"))),
        ]);

        run(
            events,
            reconciler(registry.clone(), 2),
            Duration::from_secs(60),
            ShutdownSignal::new(),
        )
        .await;

        assert_eq!(
            registry.calls(),
            vec!["register api-apps 10.0.0.1", "deregister api-apps"]
        );
    }

    #[tokio::test]
    async fn test_shutdown_stops_pending_stream() {
        let registry = Arc::new(MemoryRegistry::default());
        let events = futures::stream::iter(vec![Ok::<_, String>(SourceEvent::Apply(obs(
            "default", "web", "10.0.0.2",
        )))])
        .chain(futures::stream::pending());
        let shutdown = ShutdownSignal::new();

        let handle = tokio::spawn(run(
            events,
            reconciler(registry.clone(), 0),
            Duration::from_secs(60),
            shutdown.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.shutdown();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("runner did not stop")
            .unwrap();

        assert_eq!(
            registry.calls(),
            vec!["register web-default 10.0.0.2", "register web 10.0.0.2"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_resync_does_not_repeat_registration() {
        let registry = Arc::new(MemoryRegistry::default());
        let events = futures::stream::iter(vec![Ok::<_, String>(SourceEvent::Apply(obs(
            "apps", "api", "10.0.0.1",
        )))])
        .chain(futures::stream::pending());
        let shutdown = ShutdownSignal::new();

        let handle = tokio::spawn(run(
            events,
            reconciler(registry.clone(), 0),
            Duration::from_secs(10),
            shutdown.clone(),
        ));

        // Several resync ticks elapse.
        tokio::time::sleep(Duration::from_secs(35)).await;
        shutdown.shutdown();
        handle.await.unwrap();

        assert_eq!(registry.calls(), vec!["register api-apps 10.0.0.1"]);
    }
}
