//! Configuration management for the registrar controller.
//!
//! Provides layered configuration loading from multiple sources with priority:
//! 1. Default values (hardcoded)
//! 2. Local config file (`config/registrar.toml`, optional)
//! 3. File named by `CONFIG_PATH`
//! 4. Environment variables prefixed with `REGISTRAR__`
//! 5. `REGISTRY_API_ADDRESS` (highest priority, registry address only)

mod cluster;
mod controller;
mod monitoring;
mod registry;
mod retry;
pub use cluster::*;
pub use controller::*;
pub use monitoring::*;
pub use registry::*;
pub use retry::*;


//---
use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::CONFIG_ENV_PREFIX;
use crate::constants::CONFIG_FILE;
use crate::constants::REGISTRY_ADDRESS_ENV;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    /// Worker pool and startup behaviour
    #[serde(default)]
    pub controller: ControllerConfig,
    /// External registry endpoint and timeouts
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Work queue rate limiting and retry policy
    #[serde(default)]
    pub queue: QueueConfig,
    /// Watched workloads and resync
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// Metrics endpoint
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// The two knobs the controller constructor needs from an operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrarConfig {
    pub registry_base_address: String,
    pub worker_count: usize,
}

impl Settings {
    /// Load configuration from every source, highest priority last.
    ///
    /// # Arguments
    /// * `config_path` - Optional explicit config file, applied after
    ///   `CONFIG_PATH`
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Config::builder().add_source(Config::try_from(&Settings::default())?);

        config = config.add_source(File::with_name(CONFIG_FILE).required(false));

        if let Ok(path) = env::var("CONFIG_PATH") {
            config = config.add_source(File::with_name(&path).required(true));
        }

        if let Some(path) = config_path {
            config = config.add_source(File::with_name(path).required(true));
        }

        config = config.add_source(
            Environment::with_prefix(CONFIG_ENV_PREFIX)
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        if let Ok(address) = env::var(REGISTRY_ADDRESS_ENV) {
            if !address.trim().is_empty() {
                config = config.set_override("registry.base_address", address)?;
            }
        }

        let settings: Settings = config.build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Validates every section
    /// # Errors
    /// Returns the first `Error::InvalidConfig` encountered
    pub fn validate(&self) -> Result<()> {
        self.controller.validate()?;
        self.registry.validate()?;
        self.queue.validate()?;
        self.cluster.validate()?;
        self.monitoring.validate()?;
        Ok(())
    }

    pub fn registrar_config(&self) -> RegistrarConfig {
        RegistrarConfig {
            registry_base_address: self.registry.base_address.clone(),
            worker_count: self.controller.workers,
        }
    }
}
