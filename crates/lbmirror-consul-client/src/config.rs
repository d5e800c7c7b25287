// Configuration for ConsulClient

use crate::constants::DEFAULT_ENDPOINT;

/// Configuration for the Consul agent HTTP client
#[derive(Clone, Debug)]
pub struct ConsulClientConfig {
    /// Agent address, either `host:port` or a full base URL (e.g. "sidecar:8500")
    pub endpoint: String,
    /// Optional ACL token sent with every request
    pub token: Option<String>,
    /// Connection timeout in milliseconds (default: 5000)
    pub connect_timeout_ms: u64,
    /// Request timeout in milliseconds (default: 30000)
    pub request_timeout_ms: u64,
}

impl Default for ConsulClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: None,
            connect_timeout_ms: 5000,
            request_timeout_ms: 30000,
        }
    }
}

impl ConsulClientConfig {
    /// Create a new config for the given agent endpoint
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            ..Default::default()
        }
    }

    /// Set the ACL token
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Set timeouts
    pub fn with_timeouts(mut self, connect_ms: u64, request_ms: u64) -> Self {
        self.connect_timeout_ms = connect_ms;
        self.request_timeout_ms = request_ms;
        self
    }

    /// Base URL for agent calls. A bare `host:port` is assumed to speak plain HTTP.
    pub fn base_url(&self) -> String {
        let endpoint = self.endpoint.trim().trim_end_matches('/');
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("http://{}", endpoint)
        }
    }
}
