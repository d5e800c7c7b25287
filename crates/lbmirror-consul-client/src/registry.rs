//! Registry abstraction used by the reconciler.
//!
//! [`ServiceRegistry`] is one attempt against the backing registry. [`RegistryClient`]
//! wraps it with the retry policy and absorbs failures: once the attempts are used
//! up the error is logged and dropped, and the caller carries on as if the call
//! went through.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::client::ConsulClient;
use crate::error::ConsulError;
use crate::retry::RetryPolicy;

/// Single-attempt registry operations.
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// Create or replace the entry `hostname` pointing at `address`
    async fn register(&self, hostname: &str, address: &str) -> Result<(), ConsulError>;

    /// Remove the entry `hostname`
    async fn deregister(&self, hostname: &str) -> Result<(), ConsulError>;
}

#[async_trait]
impl ServiceRegistry for ConsulClient {
    async fn register(&self, hostname: &str, address: &str) -> Result<(), ConsulError> {
        self.register_service(hostname, address).await
    }

    async fn deregister(&self, hostname: &str) -> Result<(), ConsulError> {
        self.deregister_service(hostname).await
    }
}

/// Retrying, best-effort registry facade.
#[derive(Clone)]
pub struct RegistryClient {
    registry: Arc<dyn ServiceRegistry>,
    policy: RetryPolicy,
}

impl RegistryClient {
    pub fn new(registry: Arc<dyn ServiceRegistry>, policy: RetryPolicy) -> Self {
        Self { registry, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Register `hostname` at `address`. Returns whether the registry accepted it.
    pub async fn register(&self, hostname: &str, address: &str) -> bool {
        let result = self
            .policy
            .run("register", hostname, || {
                self.registry.register(hostname, address)
            })
            .await;

        if result.is_ok() {
            info!(hostname = %hostname, address = %address, "Registered service");
        }
        result.is_ok()
    }

    /// Deregister `hostname`. Returns whether the registry accepted it.
    pub async fn deregister(&self, hostname: &str) -> bool {
        let result = self
            .policy
            .run("deregister", hostname, || self.registry.deregister(hostname))
            .await;

        if result.is_ok() {
            info!(hostname = %hostname, "Deregistered service");
        }
        result.is_ok()
    }
}
