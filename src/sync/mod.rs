//! Level-triggered sync of one workload key against the registry.
//!
//! The engine looks at current state only: whatever event woke the key up,
//! it compares the cached workload's projection with the registry's record
//! and writes only when they differ.


use std::fmt;
use std::sync::Arc;

use autometrics::autometrics;
use tokio::time::Instant;
use tracing::debug;
use tracing::info;

use crate::metrics::RECONCILE_DURATION_SECONDS;
use crate::metrics::RECONCILE_TOTAL;
use crate::Annotator;
use crate::RegistryClient;
use crate::Result;
use crate::WatchCache;
use crate::WorkKey;
use crate::API_SLO;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Workload left the cache before the key was processed
    Vanished,
    /// Registry already matched; nothing written
    InSync,
    /// Record was absent and has been created
    Created,
    /// Existing record has been brought up to date
    Updated,
}

impl SyncOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOutcome::Vanished => "vanished",
            SyncOutcome::InSync => "in_sync",
            SyncOutcome::Created => "created",
            SyncOutcome::Updated => "updated",
        }
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct SyncEngine {
    cache: Arc<WatchCache>,
    registry: Arc<dyn RegistryClient>,
    annotator: Annotator,
}

impl SyncEngine {
    pub fn new(
        cache: Arc<WatchCache>,
        registry: Arc<dyn RegistryClient>,
        annotator: Annotator,
    ) -> Self {
        Self {
            cache,
            registry,
            annotator,
        }
    }

    /// Converges the registry record for `key`. Errors are transient unless
    /// [`crate::Error::is_retryable`] says otherwise.
    pub async fn sync(
        &self,
        key: &WorkKey,
    ) -> Result<SyncOutcome> {
        let started = Instant::now();
        let result = self.reconcile(key).await;

        let label = match &result {
            Ok(outcome) => outcome.as_str(),
            Err(_) => "error",
        };
        RECONCILE_TOTAL.with_label_values(&[label]).inc();
        RECONCILE_DURATION_SECONDS
            .with_label_values(&[label])
            .observe(started.elapsed().as_secs_f64());

        result
    }

    #[autometrics(objective = API_SLO)]
    async fn reconcile(
        &self,
        key: &WorkKey,
    ) -> Result<SyncOutcome> {
        key.split()?;

        let Some(workload) = self.cache.get(key) else {
            debug!(%key, "workload no longer cached, nothing to sync");
            return Ok(SyncOutcome::Vanished);
        };

        let current = self.registry.fetch(&workload.uid).await?;
        let desired = workload.desired_record();

        if current.as_ref() == Some(&desired) {
            debug!(%key, id = %desired.id, "already in sync");
            return Ok(SyncOutcome::InSync);
        }

        let outcome = if self.registry.exists(&desired.id).await? {
            SyncOutcome::Updated
        } else {
            self.registry.create(&desired).await?;
            SyncOutcome::Created
        };
        self.registry.update(&desired.id, &desired).await?;

        self.annotator.mark_registered(&workload).await?;

        info!(%key, id = %desired.id, %outcome, "workload synced");
        Ok(outcome)
    }
}
