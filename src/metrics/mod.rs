use autometrics::prometheus_exporter;
use lazy_static::lazy_static;
use prometheus::core::Collector;
use prometheus::exponential_buckets;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::IntCounterVec;
use prometheus::IntGaugeVec;
use prometheus::Opts;
use prometheus::Registry;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use warp::Filter;
use warp::Rejection;
use warp::Reply;


lazy_static! {
    /// Sync outcomes: vanished, in_sync, created, updated, error
    pub static ref RECONCILE_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("reconcile_total", "Reconcile attempts by outcome"),
        &["result"]
    )
    .expect("metric can not be created");

    pub static ref RECONCILE_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new("reconcile_duration_seconds", "Time spent in one sync of a key")
            .buckets(exponential_buckets(0.001, 2.0, 15).expect("valid buckets")),
        &["result"]
    )
    .expect("metric can not be created");

    /// Registry requests by operation (exists, fetch, create, update, delete, list)
    /// and outcome (ok, status, transport, decode)
    pub static ref REGISTRY_REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new("registry_requests_total", "Requests sent to the external registry"),
        &["op", "outcome"]
    )
    .expect("metric can not be created");

    pub static ref QUEUE_ADDS: IntCounterVec = IntCounterVec::new(
        Opts::new("workqueue_adds_total", "Distinct keys made pending"),
        &["queue"]
    )
    .expect("metric can not be created");

    pub static ref QUEUE_RATE_LIMITED_ADDS: IntCounterVec = IntCounterVec::new(
        Opts::new("workqueue_rate_limited_adds_total", "Adds delayed by the rate limiter"),
        &["queue"]
    )
    .expect("metric can not be created");

    pub static ref QUEUE_DEPTH: IntGaugeVec = IntGaugeVec::new(
        Opts::new("workqueue_depth", "Keys ready to be handed to a worker"),
        &["queue"]
    )
    .expect("metric can not be created");

    pub static ref POISONED_KEYS: IntCounterVec = IntCounterVec::new(
        Opts::new("poisoned_keys_total", "Keys dropped after exhausting their retries"),
        &["queue"]
    )
    .expect("metric can not be created");

    pub static ref EAGER_DELETE_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("eager_delete_failures_total", "Registry deletions that failed on a Deleted event"),
        &["namespace"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new_custom(Some("registrar".to_string()), None)
        .expect("registry can be created");
}

/// Registers every collector on `registry`.
///
/// Safe to call more than once: collectors already present are skipped.
pub(crate) fn register_custom_metrics(registry: &Registry) {
    let collectors: [Box<dyn Collector>; 8] = [
        Box::new(RECONCILE_TOTAL.clone()),
        Box::new(RECONCILE_DURATION_SECONDS.clone()),
        Box::new(REGISTRY_REQUESTS.clone()),
        Box::new(QUEUE_ADDS.clone()),
        Box::new(QUEUE_RATE_LIMITED_ADDS.clone()),
        Box::new(QUEUE_DEPTH.clone()),
        Box::new(POISONED_KEYS.clone()),
        Box::new(EAGER_DELETE_FAILURES.clone()),
    ];

    for collector in collectors {
        match registry.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => error!("could not register collector: {}", e),
        }
    }
}

/// Serves `GET /metrics` until the shutdown signal fires
pub async fn start_server(
    port: u16,
    mut shutdown_signal: watch::Receiver<()>,
) {
    register_custom_metrics(&REGISTRY);

    let metrics_route = warp::path!("metrics")
        .map(|| REGISTRY.clone())
        .and_then(metrics_handler);

    info!("metrics server listening on 0.0.0.0:{}", port);
    let (_, server) =
        warp::serve(metrics_route).bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
            let _ = shutdown_signal.changed().await;
        });
    server.await;
}

async fn metrics_handler(registry: Registry) -> Result<impl Reply, Rejection> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    };
    let mut res = String::from_utf8(buffer).unwrap_or_else(|e| {
        error!("custom metrics could not be from_utf8'd: {}", e);
        String::default()
    });

    let autometrics_body = get_metrics_body();
    res.push_str(&autometrics_body);
    Ok(res)
}

fn get_metrics_body() -> String {
    let autometrics_response = prometheus_exporter::encode_http_response();
    autometrics_response.into_body()
}
