//! Cursor-driven listing fused with controller-status extraction.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use metrics::{counter, histogram};
use serde_json::Value;
use tracing::{debug, info, warn};

use driftscope_core::{Event, Resource};
use driftscope_kubehub::{ClusterAccess, ClusterError, RawPage, Selector};

pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Continuation token plus the server's remaining-count hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    pub token: String,
    pub approx_remaining: Option<i64>,
}

/// One page of fully classified resources.
#[derive(Debug, Clone)]
pub struct Page {
    pub items: Vec<Resource>,
    /// `None` once the server returned an empty continue token.
    pub next: Option<PageCursor>,
}

impl Page {
    pub fn has_more(&self) -> bool { self.next.is_some() }

    pub fn approx_remaining(&self) -> Option<i64> {
        self.next.as_ref().and_then(|c| c.approx_remaining)
    }
}

/// Transport failure, carrying the underlying cluster error. The core never
/// retries on its own.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{op} {target}: {source}")]
    Transport { op: &'static str, target: String, source: ClusterError },
}

impl FetchError {
    fn transport(op: &'static str, target: impl ToString, source: ClusterError) -> Self {
        FetchError::Transport { op, target: target.to_string(), source }
    }
}

/// Paginated aggregator over a [`ClusterAccess`] implementation.
pub struct Paginator<C: ClusterAccess + ?Sized> {
    cluster: Arc<C>,
}

impl<C: ClusterAccess + ?Sized> Clone for Paginator<C> {
    fn clone(&self) -> Self { Self { cluster: Arc::clone(&self.cluster) } }
}

impl<C: ClusterAccess + ?Sized> Paginator<C> {
    pub fn new(cluster: Arc<C>) -> Self { Self { cluster } }

    pub fn cluster(&self) -> &Arc<C> { &self.cluster }

    /// Fetch one page. `cursor = None` starts from the beginning; a
    /// `page_size` of 0 uses [`DEFAULT_PAGE_SIZE`].
    pub async fn fetch_page(
        &self,
        selector: &Selector,
        cursor: Option<&PageCursor>,
        page_size: u32,
    ) -> Result<Page, FetchError> {
        let limit = if page_size == 0 { DEFAULT_PAGE_SIZE } else { page_size };
        let token = cursor.map(|c| c.token.as_str());
        let t0 = Instant::now();
        let raw = match self.cluster.list_page(selector, Some(limit), token).await {
            Ok(raw) => raw,
            Err(e) => {
                counter!("store_page_fetch_errors_total", 1u64);
                warn!(selector = %selector, error = %e, "page fetch failed");
                return Err(FetchError::transport("list", selector, e));
            }
        };
        histogram!("store_page_fetch_ms", t0.elapsed().as_secs_f64() * 1000.0);
        counter!("store_pages_fetched_total", 1u64);
        let page = self.materialize(selector, raw);
        debug!(selector = %selector, items = page.items.len(), more = page.has_more(), "page fetched");
        Ok(page)
    }

    /// Loop [`Self::fetch_page`] until the cursor runs out or `max_items`
    /// is reached. Interactive callers should page incrementally instead.
    pub async fn fetch_all(
        &self,
        selector: &Selector,
        page_size: u32,
        max_items: Option<usize>,
    ) -> Result<Vec<Resource>, FetchError> {
        let mut out: Vec<Resource> = Vec::new();
        let mut cursor: Option<PageCursor> = None;
        let mut pages = 0usize;
        loop {
            let page = self.fetch_page(selector, cursor.as_ref(), page_size).await?;
            pages += 1;
            out.extend(page.items);
            if let Some(max) = max_items {
                if out.len() >= max {
                    out.truncate(max);
                    break;
                }
            }
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        info!(selector = %selector, pages, items = out.len(), "fetch_all done");
        Ok(out)
    }

    /// Count objects. Uses the server's remaining-count hint when available,
    /// otherwise lists everything.
    pub async fn count_resources(&self, selector: &Selector) -> Result<usize, FetchError> {
        let probe = self
            .cluster
            .list_page(selector, Some(1), None)
            .await
            .map_err(|e| FetchError::transport("count", selector, e))?;
        if let Some(remaining) = probe.remaining {
            return Ok(remaining.max(0) as usize + probe.items.len());
        }
        if probe.continue_token.is_empty() {
            return Ok(probe.items.len());
        }
        warn!(selector = %selector, "no remaining count reported; counting with a full list");
        let all = self
            .cluster
            .list_page(selector, None, None)
            .await
            .map_err(|e| FetchError::transport("count", selector, e))?;
        Ok(all.items.len())
    }

    pub async fn get(&self, selector: &Selector, name: &str) -> Result<Resource, FetchError> {
        let raw = self
            .cluster
            .get(selector, name)
            .await
            .map_err(|e| FetchError::transport("get", format!("{} {}", selector, name), e))?;
        Ok(self.resource_from(selector, raw))
    }

    /// Events attached to `resource`, newest first.
    pub async fn events(&self, resource: &Resource) -> Result<Vec<Event>, FetchError> {
        let raw = self
            .cluster
            .list_events(resource.namespace.as_deref(), &resource.uid)
            .await
            .map_err(|e| FetchError::transport("events", resource.key(), e))?;
        let mut events: Vec<Event> = raw.iter().map(Event::from_raw).collect();
        events.sort_by(|a, b| b.last_timestamp.cmp(&a.last_timestamp));
        Ok(events)
    }

    pub async fn crd_document(&self, name: &str) -> Result<Value, FetchError> {
        self.cluster.get_crd(name).await.map_err(|e| FetchError::transport("get crd", name, e))
    }

    fn materialize(&self, selector: &Selector, raw: RawPage) -> Page {
        let items = raw.items.into_iter().map(|v| self.resource_from(selector, v)).collect();
        let next = if raw.continue_token.is_empty() {
            None
        } else {
            Some(PageCursor { token: raw.continue_token, approx_remaining: raw.remaining })
        };
        Page { items, next }
    }

    fn resource_from(&self, selector: &Selector, raw: Value) -> Resource {
        let mut r = Resource::from_raw(raw, &selector.gvr, Utc::now());
        if r.kind.is_empty() {
            r.kind = selector.kind.clone();
        }
        r
    }
}
