use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::metrics::POISONED_KEYS;
use crate::SyncEngine;
use crate::WorkKey;
use crate::WorkQueue;

/// Counts failed syncs per key.
///
/// Only the worker's retry path bumps a counter. Event deliveries go through
/// the queue's rate limiter and never count toward the poison cap.
#[derive(Debug, Default)]
pub(crate) struct RetryTracker {
    failures: DashMap<WorkKey, usize>,
}

impl RetryTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn retries(
        &self,
        key: &WorkKey,
    ) -> usize {
        self.failures.get(key).map(|n| *n).unwrap_or(0)
    }

    /// Returns the count after recording this failure
    pub(crate) fn record_retry(
        &self,
        key: &WorkKey,
    ) -> usize {
        let mut n = self.failures.entry(key.clone()).or_insert(0);
        *n += 1;
        *n
    }

    pub(crate) fn reset(
        &self,
        key: &WorkKey,
    ) {
        self.failures.remove(key);
    }
}

/// Runs one worker until the queue is shut down and drained
pub(crate) async fn run_worker(
    id: usize,
    queue: WorkQueue<WorkKey>,
    engine: Arc<SyncEngine>,
    retries: Arc<RetryTracker>,
    max_retries: usize,
) {
    debug!(worker = id, "worker started");
    while process_next_work_item(&queue, &engine, &retries, max_retries).await {}
    info!(worker = id, "worker stopped");
}

/// Takes one key off the queue and syncs it.
///
/// Returns `false` once the queue reports shutdown.
pub(crate) async fn process_next_work_item(
    queue: &WorkQueue<WorkKey>,
    engine: &SyncEngine,
    retries: &RetryTracker,
    max_retries: usize,
) -> bool {
    let Some(key) = queue.get().await else {
        return false;
    };

    match engine.sync(&key).await {
        Ok(outcome) => {
            debug!(%key, %outcome, "sync succeeded");
            retries.reset(&key);
            queue.forget(&key);
        }
        Err(e) if e.is_retryable() => {
            let failures = retries.retries(&key);
            if max_retries > 0 && failures >= max_retries {
                POISONED_KEYS.with_label_values(&[queue.name()]).inc();
                error!(%key, failures, error = %e, "giving up on poisoned key");
                retries.reset(&key);
                queue.forget(&key);
            } else {
                let failures = retries.record_retry(&key);
                warn!(%key, failures, error = %e, "sync failed, requeueing");
                queue.add_rate_limited(key.clone());
            }
        }
        Err(e) => {
            error!(%key, error = %e, "dropping key that cannot be synced");
            retries.reset(&key);
            queue.forget(&key);
        }
    }

    queue.done(&key);
    true
}
