//! Consul agent wire model

use serde::{Deserialize, Serialize};

/// Body of `PUT /v1/agent/service/register`.
///
/// Consul keys agent services by ID, which defaults to `Name`, so registering the
/// same name again replaces the previous address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentServiceRegistration {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Address")]
    pub address: String,
}

impl AgentServiceRegistration {
    pub fn new(name: &str, address: &str) -> Self {
        Self {
            name: name.to_string(),
            address: address.to_string(),
        }
    }
}
