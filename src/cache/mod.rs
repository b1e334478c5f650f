//! Local mirror of cluster workloads.
//!
//! Entries are `Arc` views that are never mutated after insertion; the
//! informer swaps whole entries as new state arrives. Workers only read.


use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::debug;

use crate::Error;
use crate::Result;
use crate::WorkKey;
use crate::WorkloadResource;

pub struct WatchCache {
    entries: DashMap<WorkKey, Arc<WorkloadResource>>,
    synced_tx: watch::Sender<bool>,
}

impl Default for WatchCache {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchCache {
    pub fn new() -> Self {
        let (synced_tx, _) = watch::channel(false);
        Self {
            entries: DashMap::new(),
            synced_tx,
        }
    }

    pub fn get(
        &self,
        key: &WorkKey,
    ) -> Option<Arc<WorkloadResource>> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn list(&self) -> Vec<Arc<WorkloadResource>> {
        self.entries.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the initial list has been fully applied
    pub fn has_synced(&self) -> bool {
        *self.synced_tx.borrow()
    }

    /// Blocks until the initial list has been applied. A zero timeout waits
    /// forever.
    pub async fn wait_for_sync(
        &self,
        timeout: Duration,
    ) -> Result<()> {
        let mut synced_rx = self.synced_tx.subscribe();
        let synced = synced_rx.wait_for(|synced| *synced);

        if timeout.is_zero() {
            synced.await.map_err(|e| Error::Fatal(format!("cache dropped: {}", e)))?;
            return Ok(());
        }

        let res = tokio::time::timeout(timeout, synced).await;
        match res {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(Error::Fatal(format!("cache dropped: {}", e))),
            Err(_) => Err(Error::CacheSyncTimeout(timeout)),
        }
    }

    /// Stores `resource`, returning the entry it replaced
    pub(crate) fn apply(
        &self,
        key: WorkKey,
        resource: Arc<WorkloadResource>,
    ) -> Option<Arc<WorkloadResource>> {
        self.entries.insert(key, resource)
    }

    pub(crate) fn remove(
        &self,
        key: &WorkKey,
    ) -> Option<Arc<WorkloadResource>> {
        self.entries.remove(key).map(|(_, resource)| resource)
    }

    /// Keys currently cached but absent from `keep`
    pub(crate) fn keys_not_in(
        &self,
        keep: &std::collections::HashSet<WorkKey>,
    ) -> Vec<WorkKey> {
        self.entries
            .iter()
            .filter(|entry| !keep.contains(entry.key()))
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub(crate) fn mark_synced(&self) {
        if !self.synced_tx.send_replace(true) {
            debug!(entries = self.len(), "watch cache synced");
        }
    }
}
