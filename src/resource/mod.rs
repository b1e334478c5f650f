//! Domain types shared by every stage of the reconcile pipeline.
//!
//! [`WorkloadResource`] is the cluster-side object as mirrored by the watch
//! cache; [`RegistryRecord`] is its projection in the external registry.

use std::collections::BTreeMap;
use std::fmt;

use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;

use crate::constants::ANNOTATION_LAST_UPDATED;
use crate::constants::ANNOTATION_LAST_VERSION;
use crate::constants::ANNOTATION_REGISTERED;
use crate::Error;
use crate::Result;


pub type Labels = BTreeMap<String, String>;
pub type Annotations = BTreeMap<String, String>;

/// A workload deployment as observed on the cluster.
///
/// Cached instances are shared behind `Arc` and never mutated; changes go
/// through a clone (see [`crate::Annotator`]).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorkloadResource {
    pub uid: String,
    pub namespace: String,
    pub name: String,
    pub labels: Labels,
    pub annotations: Annotations,
    pub resource_version: String,
}

impl WorkloadResource {
    pub fn key(&self) -> Result<WorkKey> {
        WorkKey::from_parts(&self.namespace, &self.name)
    }

    /// Projection the registry is expected to hold for this workload
    pub fn desired_record(&self) -> RegistryRecord {
        RegistryRecord {
            id: self.uid.clone(),
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            labels: self.labels.clone(),
        }
    }
}

/// The registry's representation of a workload.
///
/// Equality is structural over all four fields; labels compare as maps.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegistryRecord {
    pub id: String,
    pub name: String,
    pub namespace: String,
    #[serde(rename = "label", default, deserialize_with = "null_as_empty")]
    pub labels: Labels,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Labels, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Labels>::deserialize(deserializer)?.unwrap_or_default())
}

/// `namespace/name`, or just `name` for cluster-scoped workloads
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkKey(String);

impl WorkKey {
    pub fn from_parts(
        namespace: &str,
        name: &str,
    ) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::InvalidKey(format!(
                "workload in namespace {:?} has no name",
                namespace
            )));
        }

        if namespace.is_empty() {
            Ok(WorkKey(name.to_string()))
        } else {
            Ok(WorkKey(format!("{}/{}", namespace, name)))
        }
    }

    /// Splits the key back into `(namespace, name)`
    pub fn split(&self) -> Result<(&str, &str)> {
        let parts: Vec<&str> = self.0.split('/').collect();
        match parts.as_slice() {
            [name] if !name.is_empty() => Ok(("", *name)),
            [namespace, name] if !name.is_empty() => Ok((*namespace, *name)),
            _ => Err(Error::InvalidKey(self.0.clone())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WorkKey {
    fn from(raw: &str) -> Self {
        WorkKey(raw.to_string())
    }
}

impl fmt::Display for WorkKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Confirmation written back onto a workload after the registry accepted it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationMarker {
    pub registered: bool,
    pub last_updated: DateTime<Utc>,
    pub last_version: String,
}

impl AnnotationMarker {
    pub fn registered(
        resource_version: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            registered: true,
            last_updated: now,
            last_version: resource_version.to_string(),
        }
    }

    /// Merges the three marker entries into `annotations`, leaving unrelated
    /// keys untouched
    pub fn apply_to(
        &self,
        annotations: &mut Annotations,
    ) {
        annotations.insert(ANNOTATION_REGISTERED.to_string(), self.registered.to_string());
        annotations.insert(
            ANNOTATION_LAST_UPDATED.to_string(),
            self.last_updated.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        annotations.insert(ANNOTATION_LAST_VERSION.to_string(), self.last_version.clone());
    }
}
