//! Controller-status extraction from raw objects.
//!
//! Nothing here returns an error: status written by arbitrary controllers is
//! not guaranteed to be well-formed, so every missing or mistyped field
//! degrades to a zero value (`0`, empty string, `None`).

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::{Condition, Conditions, Event, GroupVersionResource, ManagedFieldEntry, Resource};

/// Field-set root owned by status writers.
pub const STATUS_MARKER: &str = "f:status";
/// Field-set root owned by spec writers.
pub const SPEC_MARKER: &str = "f:spec";

/// Fallback rules marking a manager as a controller when its field set does
/// not carry [`STATUS_MARKER`]. Each entry is `(substring, label)`; the
/// substring is matched against the lowercased manager name, first hit wins.
pub const CONTROLLER_NAME_RULES: &[(&str, &str)] = &[
    ("controller", "controller"),
    ("operator", "operator"),
    ("reconciler", "reconciler"),
    ("argocd", "argocd"),
    ("crossplane", "crossplane"),
    ("flux", "flux"),
    ("helm", "helm"),
    ("kustomize", "kustomize"),
    ("cert-manager", "cert-manager"),
];

/// Known long manager identifiers and their display aliases.
const MANAGER_ALIASES: &[(&str, &str)] = &[
    ("argocd-application-controller", "argocd"),
    ("crossplane-kubernetes.crossplane.io", "crossplane"),
    ("helm-controller", "helm"),
    ("kustomize-controller", "kustomize"),
    ("source-controller", "flux-src"),
    ("cert-manager-controller", "cert-mgr"),
    ("cert-manager", "cert-mgr"),
];

const MANAGER_MAX_CHARS: usize = 15;
const MANAGER_KEEP_CHARS: usize = 12;

/// Everything the extractor derives from one raw object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerStatus {
    pub observed_generation: i64,
    pub conditions: Conditions,
    pub controller_manager: String,
    pub last_status_write: Option<DateTime<Utc>>,
    pub last_spec_write: Option<DateTime<Utc>>,
}

/// Result of scanning managedFields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerInfo {
    pub manager: String,
    pub last_status_write: Option<DateTime<Utc>>,
    pub last_spec_write: Option<DateTime<Utc>>,
}

pub fn extract(raw: &Value) -> ControllerStatus {
    let info = controller_info(&managed_fields(raw));
    ControllerStatus {
        observed_generation: observed_generation(raw),
        conditions: conditions(raw),
        controller_manager: info.manager,
        last_status_write: info.last_status_write,
        last_spec_write: info.last_spec_write,
    }
}

/// `status.observedGeneration`, or 0 when absent or not an integer.
pub fn observed_generation(raw: &Value) -> i64 {
    raw.get("status")
        .and_then(|s| s.get("observedGeneration"))
        .and_then(Value::as_i64)
        .unwrap_or(0)
}

/// `status.conditions[]` in source order. Entries that are not maps are
/// skipped; missing string fields become empty.
pub fn conditions(raw: &Value) -> Conditions {
    let Some(list) = raw.get("status").and_then(|s| s.get("conditions")).and_then(Value::as_array) else {
        return Conditions::new();
    };
    list.iter()
        .filter(|c| c.is_object())
        .map(|c| Condition {
            type_: str_field(c, "type"),
            status: str_field(c, "status"),
            reason: str_field(c, "reason"),
            message: str_field(c, "message"),
            last_transition_time: c.get("lastTransitionTime").and_then(Value::as_str).and_then(parse_time),
        })
        .collect()
}

/// Decode `metadata.managedFields[]`. Non-map entries are skipped.
pub fn managed_fields(raw: &Value) -> Vec<ManagedFieldEntry> {
    let Some(list) = raw.get("metadata").and_then(|m| m.get("managedFields")).and_then(Value::as_array) else {
        return Vec::new();
    };
    list.iter()
        .filter(|e| e.is_object())
        .map(|e| ManagedFieldEntry {
            manager: str_field(e, "manager"),
            operation: str_field(e, "operation"),
            subresource: str_field(e, "subresource"),
            time: e.get("time").and_then(Value::as_str).and_then(parse_time),
            field_roots: e
                .get("fieldsV1")
                .and_then(Value::as_object)
                .map(|fs| fs.keys().cloned().collect())
                .unwrap_or_default(),
        })
        .collect()
}

impl ManagedFieldEntry {
    fn has_root(&self, marker: &str) -> bool {
        self.field_roots.iter().any(|r| r == marker)
    }

    /// Status subresource write, `f:status` ownership, or a controller-like
    /// manager name.
    pub fn manages_status(&self) -> bool {
        self.subresource == "status" || self.has_root(STATUS_MARKER) || controller_label(&self.manager).is_some()
    }

    /// `f:spec` ownership on the main resource.
    pub fn manages_spec(&self) -> bool {
        self.subresource.is_empty() && self.has_root(SPEC_MARKER)
    }
}

/// Label of the first [`CONTROLLER_NAME_RULES`] entry matching `manager`.
pub fn controller_label(manager: &str) -> Option<&'static str> {
    let lower = manager.to_lowercase();
    CONTROLLER_NAME_RULES
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, label)| *label)
}

/// Pick the latest status writer and the latest spec write. Entries without
/// a timestamp are ignored. On equal timestamps the later entry wins.
pub fn controller_info(entries: &[ManagedFieldEntry]) -> ControllerInfo {
    let mut out = ControllerInfo::default();
    for e in entries {
        let Some(ts) = e.time else { continue };
        if e.manages_status() && out.last_status_write.map_or(true, |cur| ts >= cur) {
            out.last_status_write = Some(ts);
            out.manager = e.manager.clone();
        }
        if e.manages_spec() && out.last_spec_write.map_or(true, |cur| ts >= cur) {
            out.last_spec_write = Some(ts);
        }
    }
    out
}

/// Short display form of a field manager name.
///
/// `""` → `"-"`, known controllers → alias, names longer than 15 chars →
/// first 12 chars + `"..."`.
pub fn shorten_manager_name(manager: &str) -> String {
    if manager.is_empty() {
        return "-".to_string();
    }
    if let Some((_, alias)) = MANAGER_ALIASES.iter().find(|(long, _)| *long == manager) {
        return (*alias).to_string();
    }
    if manager.chars().count() > MANAGER_MAX_CHARS {
        let head: String = manager.chars().take(MANAGER_KEEP_CHARS).collect();
        return format!("{}...", head);
    }
    manager.to_string()
}

/// RFC3339 timestamp, `None` on parse failure.
pub fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

fn str_field(v: &Value, key: &str) -> String {
    v.get(key).and_then(Value::as_str).unwrap_or("").to_string()
}

impl Resource {
    /// Materialize a resource from a raw object, running the extractor.
    /// `now` is used for `age` only.
    pub fn from_raw(raw: Value, gvr: &GroupVersionResource, now: DateTime<Utc>) -> Self {
        let meta = raw.get("metadata");
        let meta_str = |key: &str| meta.and_then(|m| m.get(key)).and_then(Value::as_str);
        let created_at = meta_str("creationTimestamp").and_then(parse_time);
        let age = created_at.map(|c| (now - c).max(Duration::zero())).unwrap_or_else(Duration::zero);
        let st = extract(&raw);
        Resource {
            name: meta_str("name").unwrap_or("").to_string(),
            namespace: meta_str("namespace").filter(|ns| !ns.is_empty()).map(str::to_string),
            uid: meta_str("uid").unwrap_or("").to_string(),
            kind: raw.get("kind").and_then(Value::as_str).unwrap_or("").to_string(),
            gvr: gvr.clone(),
            created_at,
            age,
            generation: meta.and_then(|m| m.get("generation")).and_then(Value::as_i64).unwrap_or(0),
            observed_generation: st.observed_generation,
            conditions: st.conditions,
            controller_manager: st.controller_manager,
            last_status_write: st.last_status_write,
            last_spec_write: st.last_spec_write,
            raw: Arc::new(raw),
        }
    }

    /// Re-run the extractor against the retained raw object.
    pub fn controller_status(&self) -> ControllerStatus {
        extract(&self.raw)
    }
}

impl Event {
    /// Decode a raw core/v1 Event. Falls back to `eventTime` when
    /// `lastTimestamp` is unset.
    pub fn from_raw(raw: &Value) -> Self {
        let ts = |key: &str| raw.get(key).and_then(Value::as_str).and_then(parse_time);
        Event {
            type_: str_field(raw, "type"),
            reason: str_field(raw, "reason"),
            message: str_field(raw, "message"),
            last_timestamp: ts("lastTimestamp").or_else(|| ts("eventTime")),
            count: raw
                .get("count")
                .and_then(Value::as_i64)
                .and_then(|c| i32::try_from(c).ok())
                .unwrap_or(0),
        }
    }
}
