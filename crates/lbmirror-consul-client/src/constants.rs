// Consul agent API path constants

pub mod agent_api_path {
    // Service registration
    pub const SERVICE_REGISTER: &str = "/v1/agent/service/register";
    pub const SERVICE_DEREGISTER: &str = "/v1/agent/service/deregister";
}

/// Header carrying the Consul ACL token
pub const CONSUL_TOKEN_HEADER: &str = "X-Consul-Token";

pub const DEFAULT_ENDPOINT: &str = "sidecar:8500";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_ATTEMPT_WAIT_SECONDS: u64 = 2;
