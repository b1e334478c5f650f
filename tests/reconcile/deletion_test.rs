use std::sync::Arc;
use std::time::Duration;

use registrar::ControllerBuilder;
use registrar::SourceEvent;
use serde_json::json;
use tokio::sync::watch;

use crate::common::scripted_source;
use crate::common::settings;
use crate::common::svc_a;
use crate::common::wait_until;
use crate::common::CallLog;
use crate::common::FakeRegistry;
use crate::common::RecordingCluster;

#[tokio::test]
async fn test_deleted_workload_is_deregistered_without_queueing() {
    let log = CallLog::default();
    let registry = FakeRegistry::start(log.clone()).await;
    registry.seed(json!({"id": "u1", "name": "svc-a", "namespace": "ns1", "label": {"tier": "web"}}));
    let cluster = Arc::new(RecordingCluster::new(log.clone()));
    let (tx, source) = scripted_source();
    let controller = ControllerBuilder::new(settings(&registry), source, cluster.clone())
        .build()
        .unwrap();
    let queue = controller.queue();
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let handle = tokio::spawn(controller.run(shutdown_rx));

    tx.send(Ok(SourceEvent::Restarted)).unwrap();
    tx.send(Ok(SourceEvent::ListDone)).unwrap();
    tx.send(Ok(SourceEvent::Removed(svc_a()))).unwrap();
    wait_until(|| registry.record("u1").is_none()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(registry.requests(), vec!["DELETE /deployments/u1"]);
    assert!(queue.is_empty());
    assert!(cluster.updates().is_empty());

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_orphans_are_pruned_on_start_when_enabled() {
    let log = CallLog::default();
    let registry = FakeRegistry::start(log.clone()).await;
    registry.seed(json!({"id": "u-old", "name": "old", "namespace": "ns1", "label": {}}));
    let (tx, source) = scripted_source();
    let mut settings = settings(&registry);
    settings.controller.prune_orphans_on_start = true;
    let controller = ControllerBuilder::new(settings, source, Arc::new(RecordingCluster::new(log.clone())))
        .build()
        .unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let handle = tokio::spawn(controller.run(shutdown_rx));

    tx.send(Ok(SourceEvent::Restarted)).unwrap();
    tx.send(Ok(SourceEvent::ListDone)).unwrap();
    wait_until(|| registry.record("u-old").is_none()).await;

    assert_eq!(
        registry.requests(),
        vec!["GET /deployments", "DELETE /deployments/u-old"]
    );

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}
