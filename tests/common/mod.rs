use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use registrar::ClusterApi;
use registrar::Result;
use registrar::Settings;
use registrar::SourceEvent;
use registrar::WatchSource;
use registrar::WorkloadResource;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio_stream::wrappers::UnboundedReceiverStream;
use warp::http::Method;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::path::FullPath;
use warp::Filter;

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Calls seen by the fake registry and the fake cluster, in order.
/// Registry entries read `"<METHOD> <path>"`; annotation writes read
/// `"ANNOTATE <namespace>/<name>"`.
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// In-memory registry speaking the `/deployments` protocol
pub struct FakeRegistry {
    pub addr: SocketAddr,
    records: Arc<Mutex<BTreeMap<String, Value>>>,
    log: CallLog,
    _shutdown_tx: oneshot::Sender<()>,
}

impl FakeRegistry {
    pub async fn start(log: CallLog) -> Self {
        let records: Arc<Mutex<BTreeMap<String, Value>>> = Arc::new(Mutex::new(BTreeMap::new()));
        let state = records.clone();
        let calls = log.clone();

        let route = warp::method().and(warp::path::full()).and(warp::body::bytes()).map(
            move |method: Method, path: FullPath, body: Bytes| {
                calls.lock().push(format!("{} {}", method, path.as_str()));
                let id = path.as_str().strip_prefix("/deployments").unwrap_or("").trim_matches('/');
                let (status, reply) = handle(&state, &method, id, &body);
                warp::reply::with_status(
                    warp::reply::with_header(reply, "content-type", "application/json"),
                    status,
                )
            },
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (addr, server) =
            warp::serve(route).bind_with_graceful_shutdown(([127, 0, 0, 1], 0), async {
                shutdown_rx.await.ok();
            });
        tokio::spawn(server);

        Self {
            addr,
            records,
            log,
            _shutdown_tx: shutdown_tx,
        }
    }

    pub fn base_address(&self) -> String {
        format!("{}/deployments", self.addr)
    }

    pub fn seed(
        &self,
        record: Value,
    ) {
        let id = record["id"].as_str().unwrap().to_string();
        self.records.lock().insert(id, record);
    }

    pub fn record(
        &self,
        id: &str,
    ) -> Option<Value> {
        self.records.lock().get(id).cloned()
    }

    /// Registry calls only, annotation writes filtered out
    pub fn requests(&self) -> Vec<String> {
        self.log.lock().iter().filter(|c| !c.starts_with("ANNOTATE")).cloned().collect()
    }
}

fn handle(
    records: &Mutex<BTreeMap<String, Value>>,
    method: &Method,
    id: &str,
    body: &[u8],
) -> (StatusCode, String) {
    let mut records = records.lock();
    match (method.as_str(), id.is_empty()) {
        ("GET", true) => {
            let all: Vec<&Value> = records.values().collect();
            (StatusCode::OK, serde_json::to_string(&all).unwrap())
        }
        ("GET", false) => match records.get(id) {
            Some(record) => (StatusCode::OK, record.to_string()),
            None => (StatusCode::NOT_FOUND, String::new()),
        },
        ("POST", true) => {
            let record: Value = serde_json::from_slice(body).unwrap();
            let id = record["id"].as_str().unwrap_or_default().to_string();
            records.insert(id, record);
            (StatusCode::CREATED, String::new())
        }
        ("PATCH", false) if records.contains_key(id) => {
            let record: Value = serde_json::from_slice(body).unwrap();
            records.insert(id.to_string(), record);
            (StatusCode::OK, String::new())
        }
        ("DELETE", false) => match records.remove(id) {
            Some(_) => (StatusCode::NO_CONTENT, String::new()),
            None => (StatusCode::NOT_FOUND, String::new()),
        },
        _ => (StatusCode::NOT_FOUND, String::new()),
    }
}

/// Watch source driven by the test
pub struct ScriptedSource {
    rx: Mutex<Option<mpsc::UnboundedReceiver<Result<SourceEvent>>>>,
}

pub fn scripted_source() -> (mpsc::UnboundedSender<Result<SourceEvent>>, ScriptedSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        tx,
        ScriptedSource {
            rx: Mutex::new(Some(rx)),
        },
    )
}

impl WatchSource for ScriptedSource {
    fn watch(&self) -> BoxStream<'static, Result<SourceEvent>> {
        match self.rx.lock().take() {
            Some(rx) => UnboundedReceiverStream::new(rx).boxed(),
            None => futures::stream::pending().boxed(),
        }
    }
}

/// Cluster API recording annotation writes into the shared call log
pub struct RecordingCluster {
    log: CallLog,
    pub updates: Mutex<Vec<WorkloadResource>>,
}

impl RecordingCluster {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            updates: Mutex::new(Vec::new()),
        }
    }

    pub fn updates(&self) -> Vec<WorkloadResource> {
        self.updates.lock().clone()
    }
}

#[async_trait]
impl ClusterApi for RecordingCluster {
    async fn update_workload(
        &self,
        workload: &WorkloadResource,
    ) -> Result<()> {
        self.log
            .lock()
            .push(format!("ANNOTATE {}/{}", workload.namespace, workload.name));
        self.updates.lock().push(workload.clone());
        Ok(())
    }
}

pub fn settings(registry: &FakeRegistry) -> Settings {
    let mut settings = Settings::default();
    settings.registry.base_address = registry.base_address();
    settings.controller.workers = 2;
    settings.controller.cache_sync_timeout_ms = 5_000;
    settings.cluster.resync_interval_ms = 0;
    settings.monitoring.prometheus_enabled = false;
    settings
}

pub fn svc_a() -> WorkloadResource {
    WorkloadResource {
        uid: "u1".to_string(),
        namespace: "ns1".to_string(),
        name: "svc-a".to_string(),
        labels: BTreeMap::from([("tier".to_string(), "web".to_string())]),
        annotations: BTreeMap::new(),
        resource_version: "100".to_string(),
    }
}

pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(WAIT_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
