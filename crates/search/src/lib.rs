//! driftscope search: fuzzy filtering and sorting over the materialized
//! prefix of a list.
//!
//! Matching is a case-insensitive subsequence test (skim scoring is computed
//! but only used as a yes/no gate). An empty query returns the input as-is.

#![forbid(unsafe_code)]

use std::time::Instant;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use tracing::debug;

use driftscope_core::{CrdInfo, Resource};

pub mod sort;

pub use sort::{sort_resources, SortKey, SortSpec};

/// Reusable matcher; cheap to build but not free.
pub struct Matcher {
    inner: SkimMatcherV2,
}

impl Default for Matcher {
    fn default() -> Self { Self { inner: SkimMatcherV2::default().ignore_case() } }
}

impl Matcher {
    pub fn is_match(&self, query: &str, text: &str) -> bool {
        query.is_empty() || self.inner.fuzzy_match(text, query).is_some()
    }
}

/// One-shot form of [`Matcher::is_match`].
pub fn fuzzy_match(query: &str, text: &str) -> bool { Matcher::default().is_match(query, text) }

/// Resources whose name or namespace matches `query`, in input order.
pub fn match_resources<'a>(query: &str, items: &'a [Resource]) -> Vec<&'a Resource> {
    if query.is_empty() {
        return items.iter().collect();
    }
    let m = Matcher::default();
    items
        .iter()
        .filter(|r| m.is_match(query, &r.name) || m.is_match(query, r.namespace_or_empty()))
        .collect()
}

/// CRDs whose name, kind or group matches `query`, in input order.
pub fn match_crds<'a>(query: &str, crds: &'a [CrdInfo]) -> Vec<&'a CrdInfo> {
    if query.is_empty() {
        return crds.iter().collect();
    }
    let m = Matcher::default();
    crds.iter()
        .filter(|c| m.is_match(query, &c.name) || m.is_match(query, &c.kind) || m.is_match(query, &c.group))
        .collect()
}

/// Filter then sort. Operates on whatever has been loaded so far.
pub fn filter_and_sort<'a>(query: &str, items: &'a [Resource], spec: SortSpec) -> Vec<&'a Resource> {
    let started = Instant::now();
    let mut out = match_resources(query, items);
    sort_resources(&mut out, spec);
    metrics::histogram!("search_filter_ms", started.elapsed().as_secs_f64() * 1_000.0);
    debug!(query, total = items.len(), matched = out.len(), key = %spec.key, "filtered");
    out
}
