use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_REGISTRY_ADDRESS;
use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegistryConfig {
    /// Collection address of the registry, e.g. `localhost:8090/deployments`.
    /// A missing scheme defaults to `http://`.
    #[serde(default = "default_base_address")]
    pub base_address: String,

    /// Whole-request timeout (unit: milliseconds)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// TCP connect timeout (unit: milliseconds)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_address: default_base_address(),
            request_timeout_ms: default_request_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.base_address.trim().is_empty() {
            return Err(Error::InvalidConfig("registry.base_address cannot be empty".into()));
        }

        if self.request_timeout_ms == 0 || self.connect_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "registry timeouts must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}

fn default_base_address() -> String {
    DEFAULT_REGISTRY_ADDRESS.to_string()
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_connect_timeout_ms() -> u64 {
    3_000
}
