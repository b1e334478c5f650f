use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::Patch;
use kube::api::PatchParams;
use kube::runtime::watcher;
use kube::runtime::WatchStreamExt;
use kube::Api;
use kube::Client;
use kube::ResourceExt;
use serde_json::json;
use tracing::debug;
use tracing::warn;

use super::ClusterApi;
use crate::constants::ANNOTATION_PREFIX;
use crate::ClusterConfig;
use crate::ClusterError;
use crate::Error;
use crate::Result;
use crate::SourceEvent;
use crate::WatchSource;
use crate::WorkloadResource;

/// Field manager recorded on every patch
const FIELD_MANAGER: &str = "workload-registrar";

/// Watches `apps/v1` Deployments
pub struct KubeWatchSource {
    api: Api<Deployment>,
    watcher_config: watcher::Config,
}

impl KubeWatchSource {
    pub fn new(
        client: Client,
        config: &ClusterConfig,
    ) -> Self {
        let api = if config.namespace.is_empty() {
            Api::all(client)
        } else {
            Api::namespaced(client, &config.namespace)
        };

        let mut watcher_config = watcher::Config::default();
        if let Some(selector) = config.label_selector.as_deref() {
            watcher_config = watcher_config.labels(selector);
        }

        Self {
            api,
            watcher_config,
        }
    }
}

impl WatchSource for KubeWatchSource {
    fn watch(&self) -> BoxStream<'static, Result<SourceEvent>> {
        watcher(self.api.clone(), self.watcher_config.clone())
            .default_backoff()
            .filter_map(|event| async move {
                match event {
                    Ok(event) => source_event(event).map(Ok),
                    Err(e) => Some(Err(ClusterError::Watch(e.to_string()).into())),
                }
            })
            .boxed()
    }
}

pub(crate) fn source_event(event: watcher::Event<Deployment>) -> Option<SourceEvent> {
    match event {
        watcher::Event::Init => Some(SourceEvent::Restarted),
        watcher::Event::InitApply(deployment) => to_workload(deployment).map(SourceEvent::Listed),
        watcher::Event::InitDone => Some(SourceEvent::ListDone),
        watcher::Event::Apply(deployment) => to_workload(deployment).map(SourceEvent::Applied),
        watcher::Event::Delete(deployment) => to_workload(deployment).map(SourceEvent::Removed),
    }
}

/// Projects a Deployment onto the fields the controller tracks. Objects
/// without a name or uid cannot be keyed or registered and are dropped.
pub(crate) fn to_workload(deployment: Deployment) -> Option<WorkloadResource> {
    let uid = deployment.uid();
    let name = deployment.metadata.name.clone().filter(|name| !name.is_empty());
    let (Some(uid), Some(name)) = (uid, name) else {
        warn!(
            name = ?deployment.metadata.name,
            namespace = ?deployment.metadata.namespace,
            "discarding deployment without name or uid"
        );
        return None;
    };

    let metadata = deployment.metadata;
    Some(WorkloadResource {
        uid,
        namespace: metadata.namespace.unwrap_or_default(),
        name,
        labels: metadata.labels.unwrap_or_default(),
        annotations: metadata.annotations.unwrap_or_default(),
        resource_version: metadata.resource_version.unwrap_or_default(),
    })
}

/// Writes workload changes back through the Kubernetes API
pub struct KubeClusterApi {
    client: Client,
}

impl KubeClusterApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(
        &self,
        namespace: &str,
    ) -> Api<Deployment> {
        if namespace.is_empty() {
            Api::default_namespaced(self.client.clone())
        } else {
            Api::namespaced(self.client.clone(), namespace)
        }
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn update_workload(
        &self,
        workload: &WorkloadResource,
    ) -> Result<()> {
        let patch = annotation_patch(workload);
        let params = PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };

        self.api(&workload.namespace)
            .patch(&workload.name, &params, &Patch::Merge(&patch))
            .await
            .map_err(|e| map_kube_error(e, workload))?;

        debug!(namespace = %workload.namespace, name = %workload.name, "workload annotations updated");
        Ok(())
    }
}

/// Merge patch carrying the controller's own annotations and the resource
/// version the copy was derived from.
///
/// Annotations outside [`ANNOTATION_PREFIX`] are left to their owners.
pub(crate) fn annotation_patch(workload: &WorkloadResource) -> serde_json::Value {
    let owned: serde_json::Map<String, serde_json::Value> = workload
        .annotations
        .iter()
        .filter(|(key, _)| is_owned_annotation(key))
        .map(|(key, value)| (key.clone(), json!(value)))
        .collect();

    json!({
        "metadata": {
            "resourceVersion": workload.resource_version,
            "annotations": owned,
        }
    })
}

fn is_owned_annotation(key: &str) -> bool {
    key.strip_prefix(ANNOTATION_PREFIX)
        .is_some_and(|rest| rest.starts_with('/'))
}

pub(crate) fn map_kube_error(
    error: kube::Error,
    workload: &WorkloadResource,
) -> Error {
    match error {
        kube::Error::Api(response) if response.code == 409 => ClusterError::Conflict {
            namespace: workload.namespace.clone(),
            name: workload.name.clone(),
            message: response.message,
        }
        .into(),
        kube::Error::Api(response) if response.code == 404 => ClusterError::NotFound {
            namespace: workload.namespace.clone(),
            name: workload.name.clone(),
        }
        .into(),
        other => ClusterError::Api(other.to_string()).into(),
    }
}
