//! Registrar Error Hierarchy
//!
//! Errors are grouped by the collaborator that produced them. Per-key
//! failures never escape the worker loop: they are classified with
//! [`Error::is_retryable`] and handed to the work queue's backoff.

use config::ConfigError;
use reqwest::StatusCode;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// External registry failures (transport, protocol, payload)
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Cluster API failures (watch, update, client construction)
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    /// Configuration source failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration validation failures
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Work key that can never be resolved to a workload
    #[error("Invalid resource key: {0}")]
    InvalidKey(String),

    /// Cache never reported itself populated
    #[error("Timed out waiting for cache to sync after {0:?}")]
    CacheSyncTimeout(std::time::Duration),

    #[error("{0}")]
    SignalSenderClosed(String),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// DNS, connection refused, timeout. Never conflated with a 404.
    #[error("{op} request to {url} failed: {source}")]
    Transport {
        op: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Registry answered with a status the operation does not accept
    #[error("{op} request to {url} returned unexpected status {status}")]
    UnexpectedStatus {
        op: &'static str,
        url: String,
        status: StatusCode,
    },

    /// Response body could not be decoded into a record
    #[error("failed to decode {op} response from {url}: {source}")]
    Decode {
        op: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Registry base address cannot be turned into a URL
    #[error("Invalid registry address: {0}")]
    InvalidAddress(String),

    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// Optimistic concurrency failure: the submitted copy was stale
    #[error("Conflict updating {namespace}/{name}: {message}")]
    Conflict {
        namespace: String,
        name: String,
        message: String,
    },

    /// Workload no longer exists on the cluster
    #[error("Workload {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },

    #[error("Cluster API error: {0}")]
    Api(String),

    #[error("Watch stream error: {0}")]
    Watch(String),

    /// Cannot construct a cluster client
    #[error("Cluster client unavailable: {0}")]
    Client(String),
}

impl Error {
    /// Whether the failure belongs to the transient class that is requeued
    /// with backoff. Invalid keys and configuration problems are permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Registry(RegistryError::InvalidAddress(_)) => false,
            Error::Registry(_) => true,
            Error::Cluster(ClusterError::Client(_)) => false,
            Error::Cluster(_) => true,
            Error::InvalidKey(_) => false,
            Error::Config(_) | Error::InvalidConfig(_) => false,
            Error::CacheSyncTimeout(_) => false,
            Error::SignalSenderClosed(_) | Error::Fatal(_) => false,
        }
    }
}
