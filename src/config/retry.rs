use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Per-key exponential backoff applied to failing work items
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct BackoffPolicy {
    /// Requeue attempts before a key is dropped as poisoned (0 means unlimited retries)
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Backoff base (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff time (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Work queue rate limiting: the slower of the per-key backoff and an
/// overall token bucket wins.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QueueConfig {
    #[serde(default)]
    pub backoff: BackoffPolicy,

    /// Token refill rate of the overall bucket (tokens per second)
    #[serde(default = "default_bucket_qps")]
    pub bucket_qps: f64,

    /// Bucket capacity
    #[serde(default = "default_bucket_burst")]
    pub bucket_burst: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            bucket_qps: default_bucket_qps(),
            bucket_burst: default_bucket_burst(),
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<()> {
        if self.backoff.base_delay_ms == 0 {
            return Err(Error::InvalidConfig("queue.backoff.base_delay_ms must be > 0".into()));
        }

        if self.backoff.max_delay_ms < self.backoff.base_delay_ms {
            return Err(Error::InvalidConfig(format!(
                "queue.backoff.max_delay_ms ({}) must be >= base_delay_ms ({})",
                self.backoff.max_delay_ms, self.backoff.base_delay_ms
            )));
        }

        if !(self.bucket_qps > 0.0) {
            return Err(Error::InvalidConfig("queue.bucket_qps must be > 0".into()));
        }

        if self.bucket_burst == 0 {
            return Err(Error::InvalidConfig("queue.bucket_burst must be > 0".into()));
        }

        Ok(())
    }
}

fn default_max_retries() -> usize {
    0
}
fn default_base_delay_ms() -> u64 {
    5
}
fn default_max_delay_ms() -> u64 {
    1_000_000
}
fn default_bucket_qps() -> f64 {
    10.0
}
fn default_bucket_burst() -> u32 {
    100
}
