//! List+watch driver.
//!
//! Consumes a [`WatchSource`], keeps the [`WatchCache`] current and turns
//! every observed change into a [`WorkloadEvent`] for the registered
//! [`EventHandler`].

mod event;
pub use event::*;


use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
#[cfg(test)]
use mockall::automock;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio::time::Interval;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use crate::Result;
use crate::WatchCache;
use crate::WorkKey;
use crate::WorkloadResource;

/// Delay before a watch stream that ended is opened again
const REWATCH_DELAY: Duration = Duration::from_secs(1);

/// Cluster-side list+watch transport
pub trait WatchSource: Send + Sync + 'static {
    /// Opens a stream that starts with a full list (`Restarted`, `Listed`*,
    /// `ListDone`) and then delivers changes. Recoverable errors are yielded
    /// in-band; the stream keeps going after them.
    fn watch(&self) -> BoxStream<'static, Result<SourceEvent>>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle(
        &self,
        event: WorkloadEvent,
    );
}

pub struct Informer<S> {
    source: S,
    cache: Arc<WatchCache>,
    handler: Arc<dyn EventHandler>,
    resync_interval: Duration,
    /// Objects seen since the last `Restarted`, applied on `ListDone`
    relist: Option<HashMap<WorkKey, WorkloadResource>>,
}

impl<S: WatchSource> Informer<S> {
    pub fn new(
        source: S,
        cache: Arc<WatchCache>,
        handler: Arc<dyn EventHandler>,
        resync_interval: Duration,
    ) -> Self {
        Self {
            source,
            cache,
            handler,
            resync_interval,
            relist: None,
        }
    }

    /// Runs until `shutdown_rx` fires
    pub async fn run(
        mut self,
        mut shutdown_rx: watch::Receiver<()>,
    ) -> Result<()> {
        let mut stream = self.source.watch();

        let mut resync = (!self.resync_interval.is_zero()).then(|| {
            let period = self.resync_interval;
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        info!("informer started");
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!("informer received shutdown signal");
                    return Ok(());
                }
                _ = tick(&mut resync) => {
                    self.resync().await;
                }
                next = stream.next() => match next {
                    Some(Ok(event)) => self.on_source_event(event).await,
                    Some(Err(e)) => warn!(error = %e, "watch stream error"),
                    None => {
                        warn!("watch stream ended, reopening");
                        tokio::select! {
                            _ = shutdown_rx.changed() => return Ok(()),
                            _ = tokio::time::sleep(REWATCH_DELAY) => {}
                        }
                        stream = self.source.watch();
                    }
                },
            }
        }
    }

    pub(crate) async fn on_source_event(
        &mut self,
        event: SourceEvent,
    ) {
        match event {
            SourceEvent::Restarted => {
                debug!("relist started");
                self.relist = Some(HashMap::new());
            }
            SourceEvent::Listed(resource) => {
                let Some(key) = keyed(&resource) else { return };
                match self.relist.as_mut() {
                    Some(buffer) => {
                        buffer.insert(key, resource);
                    }
                    // Listed outside a relist: treat as a plain change
                    None => self.apply(key, resource).await,
                }
            }
            SourceEvent::ListDone => {
                let listed = self.relist.take().unwrap_or_default();
                self.replace(listed).await;
                self.cache.mark_synced();
            }
            SourceEvent::Applied(resource) => {
                if let Some(key) = keyed(&resource) {
                    self.apply(key, resource).await;
                }
            }
            SourceEvent::Removed(resource) => {
                let Some(key) = keyed(&resource) else { return };
                // Prefer the last state we knew; the tombstone may be partial.
                let last_known = self.cache.remove(&key).unwrap_or_else(|| Arc::new(resource));
                self.handler.handle(WorkloadEvent::Deleted(last_known)).await;
            }
        }
    }

    async fn apply(
        &self,
        key: WorkKey,
        resource: WorkloadResource,
    ) {
        let new = Arc::new(resource);
        let event = match self.cache.apply(key, new.clone()) {
            Some(old) => WorkloadEvent::Updated { old, new },
            None => WorkloadEvent::Added(new),
        };
        self.handler.handle(event).await;
    }

    async fn replace(
        &self,
        listed: HashMap<WorkKey, WorkloadResource>,
    ) {
        let keep: HashSet<WorkKey> = listed.keys().cloned().collect();
        for key in self.cache.keys_not_in(&keep) {
            if let Some(gone) = self.cache.remove(&key) {
                self.handler.handle(WorkloadEvent::Deleted(gone)).await;
            }
        }

        debug!(count = listed.len(), "relist applied");
        for (key, resource) in listed {
            self.apply(key, resource).await;
        }
    }

    async fn resync(&self) {
        let snapshot = self.cache.list();
        trace!(count = snapshot.len(), "resync");
        for resource in snapshot {
            self.handler
                .handle(WorkloadEvent::Updated {
                    old: resource.clone(),
                    new: resource,
                })
                .await;
        }
    }
}

/// Never completes when resync is disabled
async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Malformed objects are logged and skipped
fn keyed(resource: &WorkloadResource) -> Option<WorkKey> {
    match resource.key() {
        Ok(key) => Some(key),
        Err(e) => {
            warn!(error = %e, uid = %resource.uid, "discarding malformed workload");
            None
        }
    }
}
