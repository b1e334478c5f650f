use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClusterConfig {
    /// Namespace to watch; empty watches every namespace
    #[serde(default)]
    pub namespace: String,

    /// Optional label selector narrowing the watched workloads
    #[serde(default)]
    pub label_selector: Option<String>,

    /// Interval at which every cached workload is re-delivered (0 disables)
    #[serde(default = "default_resync_interval_ms")]
    pub resync_interval_ms: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            label_selector: None,
            resync_interval_ms: default_resync_interval_ms(),
        }
    }
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(selector) = &self.label_selector {
            if selector.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "cluster.label_selector cannot be blank when set".into(),
                ));
            }
        }

        Ok(())
    }
}

fn default_resync_interval_ms() -> u64 {
    30_000
}
