use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ControllerConfig {
    /// Size of the worker pool (threadiness)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Upper bound on the initial cache sync barrier (0 waits forever)
    #[serde(default = "default_cache_sync_timeout_ms")]
    pub cache_sync_timeout_ms: u64,

    /// Delete registry records that match no cached workload once the cache
    /// is populated
    #[serde(default)]
    pub prune_orphans_on_start: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            cache_sync_timeout_ms: default_cache_sync_timeout_ms(),
            prune_orphans_on_start: false,
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::InvalidConfig("controller.workers must be at least 1".into()));
        }

        Ok(())
    }
}

fn default_workers() -> usize {
    1
}
fn default_cache_sync_timeout_ms() -> u64 {
    60_000
}
