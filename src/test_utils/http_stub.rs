use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use warp::http::Method;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::path::FullPath;
use warp::Filter;

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// Scripted HTTP endpoint that records everything it receives
pub(crate) struct StubServer {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    _shutdown_tx: oneshot::Sender<()>,
}

impl StubServer {
    /// Base address of the `/deployments` collection, without scheme
    pub fn base_address(&self) -> String {
        format!("{}/deployments", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }
}

pub(crate) async fn spawn_stub<F>(responder: F) -> StubServer
where
    F: Fn(&RecordedRequest) -> (StatusCode, String) + Send + Sync + 'static,
{
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = requests.clone();
    let responder = Arc::new(responder);

    let route = warp::method()
        .and(warp::path::full())
        .and(warp::header::optional::<String>("content-type"))
        .and(warp::body::bytes())
        .map(
            move |method: Method, path: FullPath, content_type: Option<String>, body: Bytes| {
                let request = RecordedRequest {
                    method,
                    path: path.as_str().to_string(),
                    content_type,
                    body: body.to_vec(),
                };
                let (status, reply) = responder(&request);
                recorded.lock().push(request);
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

    StubServer {
        addr,
        requests,
        _shutdown_tx: shutdown_tx,
    }
}
