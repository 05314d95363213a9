//! In-memory [`ClusterAccess`] for tests and demos.

use std::sync::atomic::{AtomicUsize, Ordering};

use rustc_hash::FxHashMap;
use serde_json::Value;

use driftscope_core::GroupVersionResource;

use crate::{ClusterAccess, ClusterError, ClusterResult, RawPage, Selector};

/// Serves objects from memory with offset-based continue tokens.
#[derive(Default)]
pub struct MockCluster {
    objects: FxHashMap<GroupVersionResource, Vec<Value>>,
    events: Vec<(String, Value)>,
    crds: FxHashMap<String, Value>,
    namespaces: Vec<String>,
    report_remaining: bool,
    fail_lists_after: Option<usize>,
    list_calls: AtomicUsize,
}

impl MockCluster {
    pub fn new() -> Self { Self::default() }

    pub fn with_objects(mut self, gvr: GroupVersionResource, items: Vec<Value>) -> Self {
        self.objects.entry(gvr).or_default().extend(items);
        self
    }

    pub fn with_event(mut self, uid: &str, event: Value) -> Self {
        self.events.push((uid.to_string(), event));
        self
    }

    pub fn with_crd(mut self, name: &str, crd: Value) -> Self {
        self.crds.insert(name.to_string(), crd);
        self
    }

    pub fn with_namespace(mut self, name: &str) -> Self {
        self.namespaces.push(name.to_string());
        self
    }

    /// Report `remainingItemCount` on limited pages.
    pub fn reporting_remaining(mut self, on: bool) -> Self {
        self.report_remaining = on;
        self
    }

    /// Fail every list call after the first `n`.
    pub fn failing_lists_after(mut self, n: usize) -> Self {
        self.fail_lists_after = Some(n);
        self
    }

    pub fn list_calls(&self) -> usize { self.list_calls.load(Ordering::SeqCst) }

    fn matching(&self, selector: &Selector) -> Vec<&Value> {
        let ns = selector.effective_namespace();
        self.objects
            .get(&selector.gvr)
            .map(|items| {
                items
                    .iter()
                    .filter(|o| match ns {
                        Some(ns) => o.pointer("/metadata/namespace").and_then(Value::as_str) == Some(ns),
                        None => true,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl ClusterAccess for MockCluster {
    async fn list_page(
        &self,
        selector: &Selector,
        limit: Option<u32>,
        continue_token: Option<&str>,
    ) -> ClusterResult<RawPage> {
        let call = self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_lists_after.is_some_and(|n| call >= n) {
            return Err(ClusterError::Other("injected list failure".to_string()));
        }
        let all = self.matching(selector);
        let start = match continue_token.filter(|t| !t.is_empty()) {
            Some(tok) => tok
                .parse::<usize>()
                .map_err(|_| ClusterError::Other(format!("invalid continue token {:?}", tok)))?,
            None => 0,
        };
        let start = start.min(all.len());
        let end = match limit {
            Some(l) if l > 0 => (start + l as usize).min(all.len()),
            _ => all.len(),
        };
        let more = end < all.len();
        Ok(RawPage {
            items: all[start..end].iter().map(|v| (*v).clone()).collect(),
            continue_token: if more { end.to_string() } else { String::new() },
            remaining: if more && self.report_remaining { Some((all.len() - end) as i64) } else { None },
        })
    }

    async fn get(&self, selector: &Selector, name: &str) -> ClusterResult<Value> {
        self.matching(selector)
            .into_iter()
            .find(|o| o.pointer("/metadata/name").and_then(Value::as_str) == Some(name))
            .cloned()
            .ok_or_else(|| ClusterError::NotFound(format!("{} {}", selector, name)))
    }

    async fn list_events(&self, _namespace: Option<&str>, uid: &str) -> ClusterResult<Vec<Value>> {
        Ok(self.events.iter().filter(|(u, _)| u == uid).map(|(_, e)| e.clone()).collect())
    }

    async fn get_crd(&self, name: &str) -> ClusterResult<Value> {
        self.crds.get(name).cloned().ok_or_else(|| ClusterError::NotFound(format!("crd {}", name)))
    }

    /// Declared namespaces plus any namespace an object lives in.
    async fn list_namespaces(&self) -> ClusterResult<Vec<String>> {
        let mut names: Vec<String> = self
            .objects
            .values()
            .flatten()
            .filter_map(|o| o.pointer("/metadata/namespace").and_then(Value::as_str))
            .map(str::to_string)
            .chain(self.namespaces.iter().cloned())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}
