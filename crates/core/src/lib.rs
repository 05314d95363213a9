//! driftscope core types: the canonical view of one custom resource and the
//! data it is derived from.
//!
//! Raw objects come in as `serde_json::Value`; [`Resource::from_raw`] turns
//! them into an immutable [`Resource`] with all controller-aware fields
//! extracted (see [`status`]). The reconciliation predicates live in
//! [`reconcile`].

#![forbid(unsafe_code)]

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

pub mod reconcile;
pub mod status;

pub use reconcile::{ReadyIcon, ReadyStatus, ReconcileState};

/// Group/version/resource triple addressing a served collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct GroupVersionResource {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl GroupVersionResource {
    pub fn new(group: &str, version: &str, resource: &str) -> Self {
        Self { group: group.to_string(), version: version.to_string(), resource: resource.to_string() }
    }

    /// `group/version`, or just `version` for the core group.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() { self.version.clone() } else { format!("{}/{}", self.group, self.version) }
    }
}

impl fmt::Display for GroupVersionResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.resource)
        } else {
            write!(f, "{}.{}/{}", self.resource, self.group, self.version)
        }
    }
}

/// A discovered custom resource kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CrdInfo {
    /// `plural.group`, matching the CustomResourceDefinition object name.
    pub name: String,
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
    pub namespaced: bool,
}

impl CrdInfo {
    pub fn gvr(&self) -> GroupVersionResource {
        GroupVersionResource::new(&self.group, &self.version, &self.plural)
    }

    pub fn scope(&self) -> &'static str {
        if self.namespaced { "Namespaced" } else { "Cluster" }
    }
}

/// Kubernetes-style condition from `status.conditions[]`.
///
/// `status` is kept verbatim (`"True"`, `"False"`, `"Unknown"`, or empty when
/// the controller omitted it).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    pub reason: String,
    pub message: String,
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl Condition {
    pub fn is_true(&self) -> bool { self.status == "True" }
    pub fn is_false(&self) -> bool { self.status == "False" }

    /// `Ready`, `Available` or `Healthy` with status `True`.
    pub fn is_ready(&self) -> bool {
        matches!(self.type_.as_str(), "Ready" | "Available" | "Healthy") && self.is_true()
    }
}

/// One `metadata.managedFields[]` record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManagedFieldEntry {
    pub manager: String,
    pub operation: String,
    /// Empty for writes to the main resource.
    pub subresource: String,
    pub time: Option<DateTime<Utc>>,
    /// Top-level keys of `fieldsV1`, e.g. `f:spec`, `f:status`.
    pub field_roots: Vec<String>,
}

/// Event attached to an object via `involvedObject.uid`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    #[serde(rename = "type")]
    pub type_: String,
    pub reason: String,
    pub message: String,
    pub last_timestamp: Option<DateTime<Utc>>,
    pub count: i32,
}

pub type Conditions = SmallVec<[Condition; 4]>;

/// Canonical, immutable view of one custom resource instance.
///
/// A refresh produces a new `Resource`; nothing here is patched in place.
#[derive(Debug, Clone)]
pub struct Resource {
    pub name: String,
    pub namespace: Option<String>,
    pub uid: String,
    pub kind: String,
    pub gvr: GroupVersionResource,
    pub created_at: Option<DateTime<Utc>>,
    /// Age at materialization time.
    pub age: Duration,

    /// `metadata.generation`
    pub generation: i64,
    /// `status.observedGeneration`, 0 when absent.
    pub observed_generation: i64,
    pub conditions: Conditions,
    /// Manager that last wrote status, from managedFields.
    pub controller_manager: String,
    pub last_status_write: Option<DateTime<Utc>>,
    pub last_spec_write: Option<DateTime<Utc>>,

    pub raw: Arc<serde_json::Value>,
}

impl Resource {
    /// `namespace/name`, or `name` for cluster-scoped objects.
    pub fn key(&self) -> String {
        match self.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => format!("{}/{}", ns, self.name),
            _ => self.name.clone(),
        }
    }

    pub fn namespace_or_empty(&self) -> &str { self.namespace.as_deref().unwrap_or("") }

    /// Look up a condition by type.
    pub fn condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }
}

pub mod prelude {
    pub use super::{
        Condition, CrdInfo, Event, GroupVersionResource, ManagedFieldEntry, ReadyIcon, ReadyStatus,
        ReconcileState, Resource,
    };
    pub use super::status::shorten_manager_name;
}
