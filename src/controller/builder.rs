//! Assembles a [`Controller`] from [`Settings`] and its cluster-facing
//! collaborators.
//!
//! ## Example
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(());
//! let controller = ControllerBuilder::new(settings, source, cluster)
//!     .start_metrics_server(shutdown_tx.subscribe())
//!     .build()?;
//! controller.run(shutdown_rx).await?;
//! ```
//!
//! The registry client defaults to [`HttpRegistryClient`] pointed at the
//! configured base address; tests swap it via
//! [`ControllerBuilder::registry_client`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use super::Controller;
use super::RetryTracker;
use crate::constants::QUEUE_NAME;
use crate::default_controller_rate_limiter;
use crate::metrics;
use crate::Annotator;
use crate::ClusterApi;
use crate::EventRouter;
use crate::HttpRegistryClient;
use crate::Informer;
use crate::RegistryClient;
use crate::RegistryConfig;
use crate::Result;
use crate::Settings;
use crate::SyncEngine;
use crate::WatchCache;
use crate::WatchSource;
use crate::WorkQueue;

pub struct ControllerBuilder<S> {
    settings: Settings,
    source: S,
    cluster: Arc<dyn ClusterApi>,
    registry: Option<Arc<dyn RegistryClient>>,
}

impl<S: WatchSource> ControllerBuilder<S> {
    pub fn new(
        settings: Settings,
        source: S,
        cluster: Arc<dyn ClusterApi>,
    ) -> Self {
        Self {
            settings,
            source,
            cluster,
            registry: None,
        }
    }

    /// Sets a custom registry client implementation
    pub fn registry_client(
        mut self,
        registry: Arc<dyn RegistryClient>,
    ) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Launches the Prometheus endpoint on the configured port, if enabled
    pub fn start_metrics_server(
        self,
        shutdown_signal: watch::Receiver<()>,
    ) -> Self {
        if self.settings.monitoring.prometheus_enabled {
            let port = self.settings.monitoring.prometheus_port;
            info!(port, "starting metrics server");
            tokio::spawn(async move {
                metrics::start_server(port, shutdown_signal).await;
            });
        }
        self
    }

    /// Validates the settings and wires cache, queue, router, sync engine
    /// and informer together.
    ///
    /// # Errors
    /// `Error::InvalidConfig` for invalid settings, `RegistryError` if the
    /// default HTTP client cannot be built.
    pub fn build(self) -> Result<Controller<S>> {
        let ControllerBuilder {
            settings,
            source,
            cluster,
            registry,
        } = self;
        settings.validate()?;
        let config = settings.registrar_config();

        let registry: Arc<dyn RegistryClient> = match registry {
            Some(registry) => registry,
            None => Arc::new(HttpRegistryClient::new(&RegistryConfig {
                base_address: config.registry_base_address.clone(),
                ..settings.registry.clone()
            })?),
        };

        let cache = Arc::new(WatchCache::new());
        let queue = WorkQueue::new(QUEUE_NAME, default_controller_rate_limiter(&settings.queue));
        let router = Arc::new(EventRouter::new(queue.clone(), registry.clone()));
        let engine = Arc::new(SyncEngine::new(
            cache.clone(),
            registry.clone(),
            Annotator::new(cluster),
        ));
        let informer = Informer::new(
            source,
            cache.clone(),
            router,
            Duration::from_millis(settings.cluster.resync_interval_ms),
        );

        Ok(Controller {
            config,
            cache_sync_timeout: Duration::from_millis(settings.controller.cache_sync_timeout_ms),
            prune_orphans_on_start: settings.controller.prune_orphans_on_start,
            max_retries: settings.queue.backoff.max_retries,
            cache,
            queue,
            registry,
            engine,
            retries: Arc::new(RetryTracker::new()),
            informer,
        })
    }
}
