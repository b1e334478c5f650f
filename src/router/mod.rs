//! Event router: reduces watch events to queue keys, except deletions, which
//! are pushed to the registry on the spot because the object can no longer
//! be resolved from the cache afterwards.


use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::metrics::EAGER_DELETE_FAILURES;
use crate::EventHandler;
use crate::RegistryClient;
use crate::WorkKey;
use crate::WorkQueue;
use crate::WorkloadEvent;

pub struct EventRouter {
    queue: WorkQueue<WorkKey>,
    registry: Arc<dyn RegistryClient>,
}

impl EventRouter {
    pub fn new(
        queue: WorkQueue<WorkKey>,
        registry: Arc<dyn RegistryClient>,
    ) -> Self {
        Self { queue, registry }
    }

    async fn deregister(
        &self,
        namespace: &str,
        name: &str,
        uid: &str,
    ) {
        if uid.is_empty() {
            warn!(namespace, name, "deleted workload has no uid, skipping deregistration");
            return;
        }

        match self.registry.delete(uid).await {
            Ok(()) => debug!(namespace, name, uid, "workload deregistered"),
            Err(e) => {
                EAGER_DELETE_FAILURES.with_label_values(&[namespace]).inc();
                error!(namespace, name, uid, error = %e, "failed to deregister deleted workload");
            }
        }
    }
}

#[async_trait]
impl EventHandler for EventRouter {
    async fn handle(
        &self,
        event: WorkloadEvent,
    ) {
        match event {
            WorkloadEvent::Added(resource) | WorkloadEvent::Updated { new: resource, .. } => {
                match resource.key() {
                    Ok(key) => self.queue.add_rate_limited(key),
                    Err(e) => warn!(error = %e, uid = %resource.uid, "discarding event"),
                }
            }
            WorkloadEvent::Deleted(resource) => {
                self.deregister(&resource.namespace, &resource.name, &resource.uid).await;
            }
        }
    }
}
