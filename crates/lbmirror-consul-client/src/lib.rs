// lbmirror-consul-client: Consul agent HTTP client with bounded retry

pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod model;
pub mod registry;
pub mod retry;

pub use client::ConsulClient;
pub use config::ConsulClientConfig;
pub use error::ConsulError;
pub use registry::{RegistryClient, ServiceRegistry};
pub use retry::RetryPolicy;
