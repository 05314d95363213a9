use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use driftscope_core::Resource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Name,
    Drift,
    Created,
    /// Lexicographic on the ready-status label.
    Status,
}

impl SortKey {
    pub const ALL: [SortKey; 4] = [SortKey::Name, SortKey::Drift, SortKey::Created, SortKey::Status];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Name => "name",
            SortKey::Drift => "drift",
            SortKey::Created => "created",
            SortKey::Status => "status",
        }
    }

    /// Direction a list view usually wants for this key: largest drift and
    /// newest first, alphabetical otherwise.
    pub fn natural_ascending(&self) -> bool { matches!(self, SortKey::Name | SortKey::Status) }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortKey::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown sort key {:?} (expected name|drift|created|status)", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: SortKey,
    pub ascending: bool,
}

impl Default for SortSpec {
    fn default() -> Self { Self { key: SortKey::Name, ascending: true } }
}

impl SortSpec {
    pub fn natural(key: SortKey) -> Self { Self { key, ascending: key.natural_ascending() } }
}

/// Stable sort; ties fall back to namespace then name, always ascending.
pub fn sort_resources(items: &mut [&Resource], spec: SortSpec) {
    items.sort_by(|a, b| {
        let primary = compare(a, b, spec.key);
        let primary = if spec.ascending { primary } else { primary.reverse() };
        primary
            .then_with(|| a.namespace_or_empty().cmp(b.namespace_or_empty()))
            .then_with(|| a.name.cmp(&b.name))
    });
}

fn compare(a: &Resource, b: &Resource, key: SortKey) -> Ordering {
    match key {
        SortKey::Name => a.name.cmp(&b.name),
        SortKey::Drift => a.drift().cmp(&b.drift()),
        SortKey::Created => a.created_at.cmp(&b.created_at),
        SortKey::Status => a.ready_status().as_str().cmp(b.ready_status().as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use driftscope_core::GroupVersionResource;
    use serde_json::{json, Value};

    fn res(raw: Value) -> Resource {
        let gvr = GroupVersionResource::new("example.io", "v1", "widgets");
        Resource::from_raw(raw, &gvr, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())
    }

    fn names(items: &[&Resource]) -> Vec<String> { items.iter().map(|r| r.key()).collect() }

    #[test]
    fn drift_descending_with_name_ties() {
        let a = res(json!({"metadata": {"name": "a", "namespace": "x", "generation": 5}, "status": {"observedGeneration": 4}}));
        let b = res(json!({"metadata": {"name": "b", "namespace": "x", "generation": 9}, "status": {"observedGeneration": 6}}));
        let c = res(json!({"metadata": {"name": "c", "namespace": "x", "generation": 2}, "status": {"observedGeneration": 1}}));
        let mut v = vec![&c, &a, &b];
        sort_resources(&mut v, SortSpec { key: SortKey::Drift, ascending: false });
        assert_eq!(names(&v), vec!["x/b", "x/a", "x/c"]);
    }

    #[test]
    fn created_orders_missing_first() {
        let old = res(json!({"metadata": {"name": "old", "creationTimestamp": "2024-01-01T00:00:00Z"}}));
        let new = res(json!({"metadata": {"name": "new", "creationTimestamp": "2024-05-01T00:00:00Z"}}));
        let none = res(json!({"metadata": {"name": "none"}}));
        let mut v = vec![&new, &none, &old];
        sort_resources(&mut v, SortSpec::natural(SortKey::Created));
        assert_eq!(names(&v), vec!["new", "old", "none"]);
        sort_resources(&mut v, SortSpec { key: SortKey::Created, ascending: true });
        assert_eq!(names(&v), vec!["none", "old", "new"]);
    }

    #[test]
    fn status_sorts_by_label() {
        let ready = res(json!({"metadata": {"name": "r"}, "status": {"conditions": [{"type": "Ready", "status": "True"}]}}));
        let failing = res(json!({"metadata": {"name": "f"}, "status": {"conditions": [{"type": "Ready", "status": "False"}]}}));
        let unknown = res(json!({"metadata": {"name": "u"}}));
        let mut v = vec![&unknown, &ready, &failing];
        sort_resources(&mut v, SortSpec::natural(SortKey::Status));
        assert_eq!(names(&v), vec!["f", "r", "u"]);
    }

    #[test]
    fn ties_break_by_namespace_then_name() {
        let a = res(json!({"metadata": {"name": "same", "namespace": "b"}}));
        let b = res(json!({"metadata": {"name": "same", "namespace": "a"}}));
        let c = res(json!({"metadata": {"name": "other", "namespace": "a"}}));
        let mut v = vec![&a, &b, &c];
        sort_resources(&mut v, SortSpec { key: SortKey::Drift, ascending: true });
        assert_eq!(names(&v), vec!["a/other", "a/same", "b/same"]);
    }

    #[test]
    fn sort_key_parses() {
        assert_eq!("Drift".parse::<SortKey>(), Ok(SortKey::Drift));
        assert!("age".parse::<SortKey>().is_err());
    }
}
