//! driftscope kubehub – cluster access layer.
//!
//! The core only needs three calls (paged list, get, events) plus CRD lookup
//! for schema browsing and a namespace listing for scope pickers. They sit behind [`ClusterAccess`] so the aggregator
//! can run against a live cluster ([`KubeCluster`]) or in memory
//! ([`MockCluster`]).

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use serde_json::Value;

use driftscope_core::{CrdInfo, GroupVersionResource};

mod live;
pub mod mock;

pub use live::{connect, KubeCluster};
pub use mock::MockCluster;

/// Selector describing one listable collection (GVR + optional namespace).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Selector {
    pub gvr: GroupVersionResource,
    pub kind: String,
    /// `None` lists across all namespaces.
    pub namespace: Option<String>,
    pub namespaced: bool,
}

impl Selector {
    pub fn for_crd(crd: &CrdInfo, namespace: Option<&str>) -> Self {
        Self {
            gvr: crd.gvr(),
            kind: crd.kind.clone(),
            namespace: if crd.namespaced { namespace.map(str::to_string) } else { None },
            namespaced: crd.namespaced,
        }
    }

    /// Namespace actually sent to the server.
    pub fn effective_namespace(&self) -> Option<&str> {
        if self.namespaced { self.namespace.as_deref() } else { None }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.effective_namespace() {
            Some(ns) => write!(f, "{} in {}", self.gvr, ns),
            None => write!(f, "{}", self.gvr),
        }
    }
}

/// One page of raw list results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPage {
    pub items: Vec<Value>,
    /// Empty when there are no further pages.
    pub continue_token: String,
    /// Server's approximate count of items after this page, if reported.
    pub remaining: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("kube api: {0}")]
    Kube(#[from] kube::Error),
    #[error("kubeconfig: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),
    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Other(String),
}

pub type ClusterResult<T> = Result<T, ClusterError>;

/// Cluster calls the core depends on. Implementations must be safe to call
/// repeatedly and concurrently.
#[async_trait::async_trait]
pub trait ClusterAccess: Send + Sync {
    /// List one page. `limit = None` asks for everything at once.
    async fn list_page(
        &self,
        selector: &Selector,
        limit: Option<u32>,
        continue_token: Option<&str>,
    ) -> ClusterResult<RawPage>;

    /// Fetch a single object by name.
    async fn get(&self, selector: &Selector, name: &str) -> ClusterResult<Value>;

    /// Events whose `involvedObject.uid` is `uid`.
    async fn list_events(&self, namespace: Option<&str>, uid: &str) -> ClusterResult<Vec<Value>>;

    /// CustomResourceDefinition object by name (`plural.group`).
    async fn get_crd(&self, name: &str) -> ClusterResult<Value>;

    /// Names of all namespaces, sorted.
    async fn list_namespaces(&self) -> ClusterResult<Vec<String>>;
}

/// Heuristic for custom groups: built-in core/apps/batch style groups carry
/// no dot.
pub fn is_custom_group(group: &str) -> bool {
    !group.is_empty() && group.contains('.')
}

/// Stable order for discovered kinds.
pub fn sort_crds(crds: &mut [CrdInfo]) {
    crds.sort_by(|a, b| a.group.cmp(&b.group).then(a.kind.cmp(&b.kind)).then(a.version.cmp(&b.version)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crd(group: &str, kind: &str, namespaced: bool) -> CrdInfo {
        CrdInfo {
            name: format!("{}s.{}", kind.to_lowercase(), group),
            group: group.to_string(),
            version: "v1".to_string(),
            kind: kind.to_string(),
            plural: format!("{}s", kind.to_lowercase()),
            namespaced,
        }
    }

    #[test]
    fn custom_group_heuristic() {
        assert!(is_custom_group("cert-manager.io"));
        assert!(!is_custom_group("apps"));
        assert!(!is_custom_group(""));
    }

    #[test]
    fn selector_drops_namespace_for_cluster_scoped() {
        let sel = Selector::for_crd(&crd("example.io", "Cluster", false), Some("prod"));
        assert_eq!(sel.effective_namespace(), None);
        let sel = Selector::for_crd(&crd("example.io", "Widget", true), Some("prod"));
        assert_eq!(sel.effective_namespace(), Some("prod"));
        assert_eq!(sel.to_string(), "widgets.example.io/v1 in prod");
    }

    #[test]
    fn crds_sort_by_group_then_kind() {
        let mut v = vec![crd("b.io", "A", true), crd("a.io", "Z", true), crd("a.io", "B", true)];
        sort_crds(&mut v);
        let kinds: Vec<_> = v.iter().map(|c| format!("{}/{}", c.group, c.kind)).collect();
        assert_eq!(kinds, vec!["a.io/B", "a.io/Z", "b.io/A"]);
    }
}
