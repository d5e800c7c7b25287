//! Execution of registry work decided by the reconciler.
//!
//! The reconciler produces, per event, an ordered list of [`RegistryOp`]s for one
//! identity. [`Dispatcher::Inline`] awaits them on the caller, so a slow retry
//! holds up the whole event stream. [`Dispatcher::Keyed`] runs a fixed pool of
//! worker tasks, each draining a bounded queue. Ops are sharded by hostname, the
//! key the registry stores entries under: two identities that derive the same
//! hostname (`a-b` in `default`, `a` in `b`) still see their calls on that
//! hostname applied in submission order. A full queue blocks the caller rather
//! than dropping work.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use lbmirror_consul_client::RegistryClient;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::model::ServiceIdentity;

/// A single registry call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryOp {
    Register { hostname: String, address: String },
    Deregister { hostname: String },
}

impl RegistryOp {
    pub fn hostname(&self) -> &str {
        match self {
            RegistryOp::Register { hostname, .. } | RegistryOp::Deregister { hostname } => hostname,
        }
    }
}

/// Ordered registry calls for one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryWork {
    pub identity: ServiceIdentity,
    pub ops: Vec<RegistryOp>,
}

impl RegistryWork {
    /// Register every hostname at `address`.
    pub fn register(identity: ServiceIdentity, hostnames: Vec<String>, address: &str) -> Self {
        let ops = hostnames
            .into_iter()
            .map(|hostname| RegistryOp::Register {
                hostname,
                address: address.to_string(),
            })
            .collect();
        Self { identity, ops }
    }

    /// Deregister every hostname.
    pub fn deregister(identity: ServiceIdentity, hostnames: Vec<String>) -> Self {
        let ops = hostnames
            .into_iter()
            .map(|hostname| RegistryOp::Deregister { hostname })
            .collect();
        Self { identity, ops }
    }
}

/// Each op is retried on its own; a failure does not stop the rest.
async fn execute(client: &RegistryClient, op: RegistryOp) {
    match op {
        RegistryOp::Register { hostname, address } => {
            client.register(&hostname, &address).await;
        }
        RegistryOp::Deregister { hostname } => {
            client.deregister(&hostname).await;
        }
    }
}

pub enum Dispatcher {
    Inline(RegistryClient),
    Keyed(KeyedDispatcher),
}

impl Dispatcher {
    pub fn inline(client: RegistryClient) -> Self {
        Dispatcher::Inline(client)
    }

    /// `workers == 0` selects inline execution. Must be called inside a tokio runtime
    /// otherwise.
    pub fn with_workers(client: RegistryClient, workers: usize, queue_capacity: usize) -> Self {
        if workers == 0 {
            Dispatcher::Inline(client)
        } else {
            Dispatcher::Keyed(KeyedDispatcher::new(client, workers, queue_capacity))
        }
    }

    pub async fn dispatch(&self, work: RegistryWork) {
        if work.ops.is_empty() {
            return;
        }
        match self {
            Dispatcher::Inline(client) => {
                for op in work.ops {
                    execute(client, op).await;
                }
            }
            Dispatcher::Keyed(keyed) => keyed.submit(work).await,
        }
    }

    /// Wait for all queued work to finish.
    pub async fn shutdown(self) {
        if let Dispatcher::Keyed(keyed) = self {
            keyed.shutdown().await;
        }
    }
}

/// Fixed pool of workers, one bounded queue each, sharded by hostname.
pub struct KeyedDispatcher {
    queues: Vec<mpsc::Sender<RegistryOp>>,
    workers: Vec<JoinHandle<()>>,
}

impl KeyedDispatcher {
    pub fn new(client: RegistryClient, workers: usize, queue_capacity: usize) -> Self {
        let workers = workers.max(1);
        let mut queues = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for index in 0..workers {
            let (tx, rx) = mpsc::channel::<RegistryOp>(queue_capacity.max(1));
            let client = client.clone();
            handles.push(tokio::spawn(async move {
                registry_worker(index, rx, client).await;
            }));
            queues.push(tx);
        }

        info!(
            workers,
            queue_capacity, "Started keyed registry dispatch workers"
        );

        Self {
            queues,
            workers: handles,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.queues.len()
    }

    fn shard_for(&self, hostname: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        hostname.hash(&mut hasher);
        (hasher.finish() % self.queues.len() as u64) as usize
    }

    /// Queue every op of `work` on the worker owning its hostname.
    pub async fn submit(&self, work: RegistryWork) {
        for op in work.ops {
            let shard = self.shard_for(op.hostname());
            if let Err(e) = self.queues[shard].send(op).await {
                error!(
                    namespace = %work.identity.namespace(),
                    name = %work.identity.name(),
                    hostname = %e.0.hostname(),
                    shard,
                    "Registry worker is gone, dropping work"
                );
            }
        }
    }

    pub async fn shutdown(self) {
        drop(self.queues);
        for handle in self.workers {
            if let Err(e) = handle.await {
                error!("Registry worker terminated abnormally: {}", e);
            }
        }
        info!("Registry dispatch workers stopped");
    }
}

async fn registry_worker(
    index: usize,
    mut queue_rx: mpsc::Receiver<RegistryOp>,
    client: RegistryClient,
) {
    while let Some(op) = queue_rx.recv().await {
        debug!(worker = index, hostname = %op.hostname(), "Executing registry op");
        execute(&client, op).await;
    }
    debug!(worker = index, "Registry worker queue closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingRegistry;
    use lbmirror_consul_client::RetryPolicy;
    use std::sync::Arc;
    use std::time::Duration;

    fn client(registry: &Arc<RecordingRegistry>) -> RegistryClient {
        RegistryClient::new(registry.clone(), RetryPolicy::new(3, Duration::from_secs(2)))
    }

    #[test]
    fn test_work_builders() {
        let id = ServiceIdentity::new("default", "web");
        let work = RegistryWork::register(id.clone(), id.hostnames("default"), "10.0.0.1");
        assert_eq!(
            work.ops,
            vec![
                RegistryOp::Register {
                    hostname: "web-default".to_string(),
                    address: "10.0.0.1".to_string()
                },
                RegistryOp::Register {
                    hostname: "web".to_string(),
                    address: "10.0.0.1".to_string()
                },
            ]
        );

        let work = RegistryWork::deregister(id.clone(), id.hostnames("other"));
        assert_eq!(
            work.ops,
            vec![RegistryOp::Deregister {
                hostname: "web-default".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_inline_executes_in_order() {
        let registry = Arc::new(RecordingRegistry::new());
        let dispatcher = Dispatcher::with_workers(client(&registry), 0, 16);
        assert!(matches!(dispatcher, Dispatcher::Inline(_)));

        let id = ServiceIdentity::new("default", "web");
        dispatcher
            .dispatch(RegistryWork::register(
                id.clone(),
                id.hostnames("default"),
                "10.0.0.1",
            ))
            .await;

        assert_eq!(
            registry.calls(),
            vec!["register web-default 10.0.0.1", "register web 10.0.0.1"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_failing_hostname_does_not_block_the_other() {
        let registry = Arc::new(RecordingRegistry::new());
        registry.fail_hostname("web-default");
        let dispatcher = Dispatcher::inline(client(&registry));

        let id = ServiceIdentity::new("default", "web");
        dispatcher
            .dispatch(RegistryWork::register(
                id.clone(),
                id.hostnames("default"),
                "10.0.0.1",
            ))
            .await;

        let calls = registry.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[3], "register web 10.0.0.1");
    }

    #[tokio::test]
    async fn test_keyed_preserves_per_hostname_order() {
        let registry = Arc::new(RecordingRegistry::new());
        let dispatcher = Dispatcher::with_workers(client(&registry), 4, 8);

        let id = ServiceIdentity::new("team", "api");
        for i in 1..=5 {
            dispatcher
                .dispatch(RegistryWork::register(
                    id.clone(),
                    id.hostnames("default"),
                    &format!("10.0.0.{i}"),
                ))
                .await;
        }
        dispatcher
            .dispatch(RegistryWork::deregister(id.clone(), id.hostnames("default")))
            .await;
        dispatcher.shutdown().await;

        assert_eq!(
            registry.calls(),
            vec![
                "register api-team 10.0.0.1",
                "register api-team 10.0.0.2",
                "register api-team 10.0.0.3",
                "register api-team 10.0.0.4",
                "register api-team 10.0.0.5",
                "deregister api-team",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_keyed_slow_hostname_does_not_block_others() {
        let registry = Arc::new(RecordingRegistry::new());
        registry.fail_hostname("stuck-default");
        let keyed = KeyedDispatcher::new(client(&registry), 8, 8);
        assert_eq!(keyed.worker_count(), 8);

        let stuck = ServiceIdentity::new("default", "stuck");
        // Find an identity whose hostname shards elsewhere.
        let other = (0..64)
            .map(|i| ServiceIdentity::new("ns", format!("svc{i}")))
            .find(|id| {
                keyed.shard_for(&id.hostnames("default")[0]) != keyed.shard_for("stuck-default")
            })
            .unwrap();

        keyed
            .submit(RegistryWork::register(
                stuck.clone(),
                vec!["stuck-default".to_string()],
                "10.0.0.1",
            ))
            .await;
        keyed
            .submit(RegistryWork::register(
                other.clone(),
                other.hostnames("default"),
                "10.0.0.2",
            ))
            .await;

        // Let the workers run up to the first retry wait of the stuck hostname.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        let expected = format!("register {}-ns 10.0.0.2", other.name());
        assert!(registry.calls().contains(&expected));

        keyed.shutdown().await;
        let stuck_calls = registry
            .calls()
            .iter()
            .filter(|c| c.starts_with("register stuck-default"))
            .count();
        assert_eq!(stuck_calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keyed_orders_calls_on_hostname_shared_by_two_identities() {
        let registry = Arc::new(RecordingRegistry::new());
        // `p` retries on its qualified name before reaching its bare name `a-b`.
        registry.fail_hostname("a-b-default");
        let dispatcher = Dispatcher::with_workers(client(&registry), 5, 8);

        let p = ServiceIdentity::new("default", "a-b");
        let q = ServiceIdentity::new("b", "a");
        assert!(p.hostnames("default").contains(&"a-b".to_string()));
        assert_eq!(q.hostnames("default"), vec!["a-b".to_string()]);

        dispatcher
            .dispatch(RegistryWork::register(p.clone(), p.hostnames("default"), "1.1.1.1"))
            .await;
        dispatcher
            .dispatch(RegistryWork::deregister(p.clone(), p.hostnames("default")))
            .await;
        dispatcher
            .dispatch(RegistryWork::register(q.clone(), q.hostnames("default"), "2.2.2.2"))
            .await;
        dispatcher.shutdown().await;

        let on_shared: Vec<String> = registry
            .calls()
            .into_iter()
            .filter(|c| c.split(' ').nth(1) == Some("a-b"))
            .collect();
        assert_eq!(
            on_shared,
            vec![
                "register a-b 1.1.1.1",
                "deregister a-b",
                "register a-b 2.2.2.2",
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_work_is_skipped() {
        let registry = Arc::new(RecordingRegistry::new());
        let dispatcher = Dispatcher::inline(client(&registry));
        dispatcher
            .dispatch(RegistryWork {
                identity: ServiceIdentity::new("default", "web"),
                ops: Vec::new(),
            })
            .await;
        assert!(registry.calls().is_empty());
    }
}
