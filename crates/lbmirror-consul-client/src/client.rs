// ConsulClient - single-attempt agent service register / deregister calls

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use tracing::debug;

use crate::{
    config::ConsulClientConfig,
    constants::{CONSUL_TOKEN_HEADER, agent_api_path},
    error::ConsulError,
    model::AgentServiceRegistration,
};

/// HTTP client for the Consul agent service endpoints
#[derive(Clone, Debug)]
pub struct ConsulClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ConsulClient {
    /// Create a new ConsulClient with the given configuration
    pub fn new(config: ConsulClientConfig) -> Result<Self, ConsulError> {
        let base_url = config.base_url();
        reqwest::Url::parse(&base_url)
            .map_err(|e| ConsulError::InvalidEndpoint(format!("{}: {}", config.endpoint, e)))?;

        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url,
            token: config.token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_token(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(CONSUL_TOKEN_HEADER, token),
            None => request,
        }
    }

    /// Create or replace the agent service `name` pointing at `address`.
    pub async fn register_service(&self, name: &str, address: &str) -> Result<(), ConsulError> {
        let url = self.build_url(agent_api_path::SERVICE_REGISTER);
        debug!(hostname = %name, address = %address, "Registering service");

        let request = self
            .client
            .put(&url)
            .json(&AgentServiceRegistration::new(name, address));
        let response = self.with_token(request).send().await?;
        Self::check_response(response).await
    }

    /// Remove the agent service `name`.
    pub async fn deregister_service(&self, name: &str) -> Result<(), ConsulError> {
        let url = format!(
            "{}/{}",
            self.build_url(agent_api_path::SERVICE_DEREGISTER),
            name
        );
        debug!(hostname = %name, "Deregistering service");

        let response = self.with_token(self.client.put(&url)).send().await?;
        Self::check_response(response).await
    }

    async fn check_response(response: reqwest::Response) -> Result<(), ConsulError> {
        let status = response.status();
        // Consul answers 200 on success; anything else, including 404, is a failure.
        if status == StatusCode::OK {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ConsulError::RequestFailed {
            status: status.as_u16(),
            body,
        })
    }
}
