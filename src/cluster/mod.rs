//! Cluster-facing collaborators: the list+watch source feeding the informer
//! and the write path used by the annotator.

mod kubernetes;
pub use kubernetes::*;


use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::Result;
use crate::WorkloadResource;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterApi: Send + Sync + 'static {
    /// Submits a modified copy of a workload. The copy carries the resource
    /// version it was derived from; a stale copy fails with
    /// [`crate::ClusterError::Conflict`].
    async fn update_workload(
        &self,
        workload: &WorkloadResource,
    ) -> Result<()>;
}
