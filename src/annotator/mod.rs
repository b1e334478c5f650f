//! Write-back of the registration marker onto cluster objects.
//!
//! Cached workloads are shared and immutable: every change is made on a
//! clone which is then submitted through [`ClusterApi`].


use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use tracing::debug;
use tracing::error;

use crate::AnnotationMarker;
use crate::ClusterApi;
use crate::Result;
use crate::WorkloadResource;

#[derive(Clone)]
pub struct Annotator {
    cluster: Arc<dyn ClusterApi>,
}

impl Annotator {
    pub fn new(cluster: Arc<dyn ClusterApi>) -> Self {
        Self { cluster }
    }

    /// Clones `cached`, applies `mutate` to the clone and submits it
    pub async fn submit_modified<F>(
        &self,
        cached: &WorkloadResource,
        mutate: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut WorkloadResource) + Send,
    {
        let mut copy = cached.clone();
        mutate(&mut copy);
        self.cluster.update_workload(&copy).await
    }

    pub async fn mark_registered(
        &self,
        cached: &WorkloadResource,
    ) -> Result<()> {
        self.mark_registered_at(cached, Utc::now()).await
    }

    pub(crate) async fn mark_registered_at(
        &self,
        cached: &WorkloadResource,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let marker = AnnotationMarker::registered(&cached.resource_version, now);
        match self.submit_modified(cached, |copy| marker.apply_to(&mut copy.annotations)).await {
            Ok(()) => {
                debug!(namespace = %cached.namespace, name = %cached.name, "registration marker written");
                Ok(())
            }
            Err(e) => {
                error!(
                    namespace = %cached.namespace,
                    name = %cached.name,
                    error = %e,
                    "registry updated but annotation write failed"
                );
                Err(e)
            }
        }
    }
}
