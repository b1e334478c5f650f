use std::sync::Arc;

use registrar::constants::ANNOTATION_LAST_VERSION;
use registrar::constants::ANNOTATION_REGISTERED;
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

/// Absent record: POST, then PATCH, then the annotation
#[tokio::test]
async fn test_new_workload_is_created_updated_and_annotated() {
    let log = CallLog::default();
    let registry = FakeRegistry::start(log.clone()).await;
    let cluster = Arc::new(RecordingCluster::new(log.clone()));
    let (tx, source) = scripted_source();
    let controller = ControllerBuilder::new(settings(&registry), source, cluster.clone())
        .build()
        .unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let handle = tokio::spawn(controller.run(shutdown_rx));

    tx.send(Ok(SourceEvent::Restarted)).unwrap();
    tx.send(Ok(SourceEvent::Listed(svc_a()))).unwrap();
    tx.send(Ok(SourceEvent::ListDone)).unwrap();
    wait_until(|| !cluster.updates().is_empty()).await;

    assert_eq!(
        log.lock().clone(),
        vec![
            "GET /deployments/u1",
            "GET /deployments/u1",
            "POST /deployments",
            "PATCH /deployments/u1",
            "ANNOTATE ns1/svc-a",
        ]
    );
    assert_eq!(
        registry.record("u1"),
        Some(json!({"id": "u1", "name": "svc-a", "namespace": "ns1", "label": {"tier": "web"}}))
    );
    let annotated = &cluster.updates()[0];
    assert_eq!(annotated.annotations[ANNOTATION_REGISTERED], "true");
    assert_eq!(annotated.annotations[ANNOTATION_LAST_VERSION], "100");

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

/// Identical record already present: nothing is written anywhere
#[tokio::test]
async fn test_in_sync_workload_causes_no_writes() {
    let log = CallLog::default();
    let registry = FakeRegistry::start(log.clone()).await;
    registry.seed(json!({"id": "u1", "name": "svc-a", "namespace": "ns1", "label": {"tier": "web"}}));
    let cluster = Arc::new(RecordingCluster::new(log.clone()));
    let (tx, source) = scripted_source();
    let controller = ControllerBuilder::new(settings(&registry), source, cluster.clone())
        .build()
        .unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let handle = tokio::spawn(controller.run(shutdown_rx));

    tx.send(Ok(SourceEvent::Restarted)).unwrap();
    tx.send(Ok(SourceEvent::Listed(svc_a()))).unwrap();
    tx.send(Ok(SourceEvent::ListDone)).unwrap();
    wait_until(|| !registry.requests().is_empty()).await;
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    assert_eq!(registry.requests(), vec!["GET /deployments/u1"]);
    assert!(cluster.updates().is_empty());

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

/// Label change on a registered workload: PATCH only, registry converges
#[tokio::test]
async fn test_label_change_converges_registry() {
    let log = CallLog::default();
    let registry = FakeRegistry::start(log.clone()).await;
    registry.seed(json!({"id": "u1", "name": "svc-a", "namespace": "ns1", "label": {"tier": "web"}}));
    let cluster = Arc::new(RecordingCluster::new(log.clone()));
    let (tx, source) = scripted_source();
    let controller = ControllerBuilder::new(settings(&registry), source, cluster.clone())
        .build()
        .unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let handle = tokio::spawn(controller.run(shutdown_rx));

    tx.send(Ok(SourceEvent::Restarted)).unwrap();
    tx.send(Ok(SourceEvent::Listed(svc_a()))).unwrap();
    tx.send(Ok(SourceEvent::ListDone)).unwrap();
    wait_until(|| !registry.requests().is_empty()).await;

    let mut changed = svc_a();
    changed.labels.insert("tier".into(), "batch".into());
    changed.resource_version = "101".into();
    tx.send(Ok(SourceEvent::Applied(changed))).unwrap();
    wait_until(|| !cluster.updates().is_empty()).await;

    assert_eq!(
        registry.record("u1").unwrap()["label"],
        json!({"tier": "batch"})
    );
    assert!(!registry.requests().iter().any(|r| r.starts_with("POST")));
    assert_eq!(
        cluster.updates()[0].annotations[ANNOTATION_LAST_VERSION],
        "101"
    );

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

/// A burst of events for one key yields syncs that never overlap
#[tokio::test]
async fn test_event_burst_is_deduplicated() {
    let log = CallLog::default();
    let registry = FakeRegistry::start(log.clone()).await;
    let cluster = Arc::new(RecordingCluster::new(log.clone()));
    let (tx, source) = scripted_source();
    let mut settings = settings(&registry);
    settings.controller.workers = 4;
    let controller = ControllerBuilder::new(settings, source, cluster.clone())
        .build()
        .unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let handle = tokio::spawn(controller.run(shutdown_rx));

    tx.send(Ok(SourceEvent::Restarted)).unwrap();
    tx.send(Ok(SourceEvent::ListDone)).unwrap();
    for _ in 0..20 {
        tx.send(Ok(SourceEvent::Applied(svc_a()))).unwrap();
    }
    wait_until(|| !cluster.updates().is_empty()).await;
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    // One POST ever, and the marker is written exactly once: later syncs
    // find the registry in sync.
    let posts = registry.requests().iter().filter(|r| r.starts_with("POST")).count();
    assert_eq!(posts, 1);
    assert_eq!(cluster.updates().len(), 1);

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}
