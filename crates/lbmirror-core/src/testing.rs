// In-memory registry for unit tests

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use lbmirror_consul_client::{ConsulError, ServiceRegistry};

/// Records every call as `"register <hostname> <address>"` or
/// `"deregister <hostname>"`; hostnames marked with `fail_hostname` always fail.
#[derive(Default)]
pub struct RecordingRegistry {
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_hostname(&self, hostname: &str) {
        self.failing.lock().unwrap().insert(hostname.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, hostname: &str, call: String) -> Result<(), ConsulError> {
        self.calls.lock().unwrap().push(call);
        if self.failing.lock().unwrap().contains(hostname) {
            return Err(ConsulError::RequestFailed {
                status: 500,
                body: "injected".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ServiceRegistry for RecordingRegistry {
    async fn register(&self, hostname: &str, address: &str) -> Result<(), ConsulError> {
        self.record(hostname, format!("register {hostname} {address}"))
    }

    async fn deregister(&self, hostname: &str) -> Result<(), ConsulError> {
        self.record(hostname, format!("deregister {hostname}"))
    }
}
