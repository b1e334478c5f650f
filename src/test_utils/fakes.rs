use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::ClusterApi;
use crate::RegistryClient;
use crate::RegistryRecord;
use crate::Result;
use crate::WorkloadResource;

/// Registry held in memory that logs each call as `"<op> <id>"`
#[derive(Default)]
pub(crate) struct InMemoryRegistry {
    records: Mutex<BTreeMap<String, RegistryRecord>>,
    calls: Mutex<Vec<String>>,
}

impl InMemoryRegistry {
    pub fn with_records(records: impl IntoIterator<Item = RegistryRecord>) -> Self {
        let registry = Self::default();
        registry
            .records
            .lock()
            .extend(records.into_iter().map(|record| (record.id.clone(), record)));
        registry
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn record(
        &self,
        id: &str,
    ) -> Option<RegistryRecord> {
        self.records.lock().get(id).cloned()
    }

    fn log(
        &self,
        op: &str,
        id: &str,
    ) {
        self.calls.lock().push(format!("{} {}", op, id));
    }
}

#[async_trait]
impl RegistryClient for InMemoryRegistry {
    async fn exists(
        &self,
        id: &str,
    ) -> Result<bool> {
        self.log("exists", id);
        Ok(self.records.lock().contains_key(id))
    }

    async fn fetch(
        &self,
        id: &str,
    ) -> Result<Option<RegistryRecord>> {
        self.log("fetch", id);
        Ok(self.records.lock().get(id).cloned())
    }

    async fn create(
        &self,
        record: &RegistryRecord,
    ) -> Result<()> {
        self.log("create", &record.id);
        self.records.lock().insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn update(
        &self,
        id: &str,
        record: &RegistryRecord,
    ) -> Result<()> {
        self.log("update", id);
        self.records.lock().insert(id.to_string(), record.clone());
        Ok(())
    }

    async fn delete(
        &self,
        id: &str,
    ) -> Result<()> {
        self.log("delete", id);
        self.records.lock().remove(id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<RegistryRecord>> {
        self.log("list", "");
        Ok(self.records.lock().values().cloned().collect())
    }
}

/// Cluster API that keeps every submitted copy
#[derive(Default)]
pub(crate) struct RecordingClusterApi {
    updates: Mutex<Vec<WorkloadResource>>,
}

impl RecordingClusterApi {
    pub fn updates(&self) -> Vec<WorkloadResource> {
        self.updates.lock().clone()
    }
}

#[async_trait]
impl ClusterApi for RecordingClusterApi {
    async fn update_workload(
        &self,
        workload: &WorkloadResource,
    ) -> Result<()> {
        self.updates.lock().push(workload.clone());
        Ok(())
    }
}
