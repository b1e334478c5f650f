//! Worker pool driving the reconcile pipeline.
//!
//! ## Lifecycle
//! 1. the informer starts filling the watch cache
//! 2. [`Controller::run`] blocks until the cache reports its initial list
//!    applied, so no worker ever sees an empty cache for extant workloads
//! 3. registry orphans are optionally pruned
//! 4. `workers` tasks loop on `get → sync → forget/requeue → done`
//! 5. on the shutdown signal the queue is shut down; workers drain and exit

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::run_worker;
use super::RetryTracker;
use crate::Informer;
use crate::RegistrarConfig;
use crate::RegistryClient;
use crate::Result;
use crate::SyncEngine;
use crate::WatchCache;
use crate::WatchSource;
use crate::WorkKey;
use crate::WorkQueue;

pub struct Controller<S> {
    pub(super) config: RegistrarConfig,
    pub(super) cache_sync_timeout: Duration,
    pub(super) prune_orphans_on_start: bool,
    pub(super) max_retries: usize,
    pub(super) cache: Arc<WatchCache>,
    pub(super) queue: WorkQueue<WorkKey>,
    pub(super) registry: Arc<dyn RegistryClient>,
    pub(super) engine: Arc<SyncEngine>,
    pub(super) retries: Arc<RetryTracker>,
    pub(super) informer: Informer<S>,
}

impl<S: WatchSource> Controller<S> {
    pub fn config(&self) -> &RegistrarConfig {
        &self.config
    }

    pub fn cache(&self) -> Arc<WatchCache> {
        self.cache.clone()
    }

    pub fn queue(&self) -> WorkQueue<WorkKey> {
        self.queue.clone()
    }

    /// Runs until `shutdown_rx` fires.
    ///
    /// # Errors
    /// `Error::CacheSyncTimeout` if the initial list does not arrive in time.
    /// Per-key failures never surface here.
    pub async fn run(
        self,
        mut shutdown_rx: watch::Receiver<()>,
    ) -> Result<()> {
        let Controller {
            config,
            cache_sync_timeout,
            prune_orphans_on_start,
            max_retries,
            cache,
            queue,
            registry,
            engine,
            retries,
            informer,
        } = self;

        let informer_handle = tokio::spawn(informer.run(shutdown_rx.clone()));

        info!("waiting for watch cache to sync");
        tokio::select! {
            synced = cache.wait_for_sync(cache_sync_timeout) => {
                if let Err(e) = synced {
                    error!(error = %e, "watch cache never synced");
                    informer_handle.abort();
                    queue.shutdown();
                    return Err(e);
                }
            }
            _ = shutdown_rx.changed() => {
                info!("shutdown requested before cache sync");
                queue.shutdown();
                return Ok(());
            }
        }
        info!(workloads = cache.len(), "watch cache synced");

        if prune_orphans_on_start {
            prune_orphans(&cache, registry.as_ref()).await;
        }

        info!(workers = config.worker_count, "starting workers");
        let workers: Vec<JoinHandle<()>> = (0..config.worker_count)
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    queue.clone(),
                    engine.clone(),
                    retries.clone(),
                    max_retries,
                ))
            })
            .collect();

        // An error means the sender is gone, which is a shutdown as well.
        let _ = shutdown_rx.changed().await;
        info!(workers = workers.len(), "shutting down workers");
        queue.shutdown();

        Ok(())
    }
}

/// Deletes registry records whose ID no cached workload carries
pub(crate) async fn prune_orphans(
    cache: &WatchCache,
    registry: &dyn RegistryClient,
) {
    let records = match registry.list().await {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, "cannot list registry, skipping orphan pruning");
            return;
        }
    };

    let known: HashSet<String> = cache.list().iter().map(|workload| workload.uid.clone()).collect();
    for record in records.iter().filter(|record| !known.contains(&record.id)) {
        match registry.delete(&record.id).await {
            Ok(()) => info!(id = %record.id, namespace = %record.namespace, name = %record.name, "pruned orphaned registry record"),
            Err(e) => warn!(id = %record.id, error = %e, "failed to prune orphaned registry record"),
        }
    }
}
