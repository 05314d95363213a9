//! Incremental list state for interactive consumers.
//!
//! A [`ResourceList`] owns the materialized prefix of one logical list and
//! allows a single outstanding page fetch. Every request carries a
//! [`PageTicket`]; results whose ticket no longer matches (list refreshed or
//! closed meanwhile) are dropped without touching the accumulated items.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use driftscope_core::Resource;
use driftscope_kubehub::{ClusterAccess, Selector};

use crate::paginate::{FetchError, Page, PageCursor, Paginator, DEFAULT_PAGE_SIZE};

/// Request the next page once the cursor is this close to the end.
pub const LOOKAHEAD_ROWS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTicket {
    epoch: u64,
    seq: u64,
    initial: bool,
}

impl PageTicket {
    pub fn is_initial(&self) -> bool { self.initial }
}

/// Work item handed to whoever runs the fetch.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub ticket: PageTicket,
    pub selector: Selector,
    pub cursor: Option<PageCursor>,
    pub page_size: u32,
}

/// Completed fetch, delivered back to the owning list.
#[derive(Debug)]
pub struct PageOutcome {
    pub ticket: PageTicket,
    pub result: Result<Page, FetchError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Stale or unexpected ticket; nothing changed.
    Discarded,
    /// Page merged; `added` new items after de-duplication.
    Loaded { added: usize },
    /// First page failed; the list is now in its error state.
    InitialFailed,
    /// Continuation failed; earlier items kept, paging stopped.
    ContinuationFailed,
}

pub struct ResourceList {
    selector: Selector,
    page_size: u32,
    items: Vec<Resource>,
    seen: FxHashSet<String>,
    next: Option<PageCursor>,
    in_flight: Option<PageTicket>,
    epoch: u64,
    seq: u64,
    error: Option<String>,
    continuation_error: Option<String>,
    retry_cursor: Option<PageCursor>,
    closed: bool,
}

impl ResourceList {
    pub fn new(selector: Selector, page_size: u32) -> Self {
        Self {
            selector,
            page_size: if page_size == 0 { DEFAULT_PAGE_SIZE } else { page_size },
            items: Vec::new(),
            seen: FxHashSet::default(),
            next: None,
            in_flight: None,
            epoch: 0,
            seq: 0,
            error: None,
            continuation_error: None,
            retry_cursor: None,
            closed: false,
        }
    }

    pub fn selector(&self) -> &Selector { &self.selector }
    pub fn items(&self) -> &[Resource] { &self.items }
    pub fn len(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn is_loading(&self) -> bool { self.in_flight.is_some() }
    pub fn is_closed(&self) -> bool { self.closed }
    pub fn has_more(&self) -> bool { self.next.is_some() }
    /// Error from the initial page; the list is empty while set.
    pub fn error(&self) -> Option<&str> { self.error.as_deref() }
    /// Error from a continuation page; earlier items are still valid.
    pub fn continuation_error(&self) -> Option<&str> { self.continuation_error.as_deref() }

    /// Materialized count plus the server's remaining hint, when known.
    pub fn approx_total(&self) -> Option<usize> {
        match &self.next {
            None => Some(self.items.len()),
            Some(c) => c.approx_remaining.map(|r| self.items.len() + r.max(0) as usize),
        }
    }

    fn issue(&mut self, cursor: Option<PageCursor>) -> PageRequest {
        self.seq += 1;
        let ticket = PageTicket { epoch: self.epoch, seq: self.seq, initial: cursor.is_none() };
        self.in_flight = Some(ticket);
        PageRequest { ticket, selector: self.selector.clone(), cursor, page_size: self.page_size }
    }

    /// Start over from the first page. Any in-flight request becomes stale.
    pub fn refresh(&mut self) -> Option<PageRequest> {
        if self.closed {
            return None;
        }
        self.epoch += 1;
        self.items.clear();
        self.seen.clear();
        self.next = None;
        self.error = None;
        self.continuation_error = None;
        self.retry_cursor = None;
        Some(self.issue(None))
    }

    /// Request the next page, unless one is already outstanding or there is
    /// nothing more to load.
    pub fn request_more(&mut self) -> Option<PageRequest> {
        if self.closed || self.in_flight.is_some() {
            return None;
        }
        let cursor = self.next.clone()?;
        Some(self.issue(Some(cursor)))
    }

    /// Whether a consumer whose cursor sits on `row` should ask for more.
    pub fn should_load_more(&self, row: usize) -> bool {
        !self.closed && self.in_flight.is_none() && self.next.is_some() && row + LOOKAHEAD_ROWS >= self.items.len()
    }

    /// Retry after a failure: the failed continuation cursor, or a full
    /// refresh after an initial failure. `None` when nothing failed.
    pub fn retry(&mut self) -> Option<PageRequest> {
        if self.closed || self.in_flight.is_some() {
            return None;
        }
        if let Some(cursor) = self.retry_cursor.take() {
            self.continuation_error = None;
            return Some(self.issue(Some(cursor)));
        }
        if self.error.is_some() {
            return self.refresh();
        }
        None
    }

    /// Tear the list down; later results are discarded.
    pub fn close(&mut self) {
        self.closed = true;
        self.epoch += 1;
        self.in_flight = None;
    }

    /// Apply a completed fetch.
    pub fn apply(&mut self, ticket: PageTicket, result: Result<Page, FetchError>) -> ApplyOutcome {
        if self.closed || self.in_flight != Some(ticket) {
            debug!(selector = %self.selector, ?ticket, "discarding stale page result");
            return ApplyOutcome::Discarded;
        }
        self.in_flight = None;
        match result {
            Ok(page) => {
                let mut added = 0usize;
                for r in page.items {
                    if self.seen.insert(dedup_key(&r)) {
                        self.items.push(r);
                        added += 1;
                    }
                }
                self.next = page.next;
                debug!(selector = %self.selector, added, total = self.items.len(), more = self.next.is_some(), "page merged");
                ApplyOutcome::Loaded { added }
            }
            Err(e) if ticket.initial => {
                warn!(selector = %self.selector, error = %e, "initial page failed");
                self.items.clear();
                self.seen.clear();
                self.next = None;
                self.error = Some(e.to_string());
                ApplyOutcome::InitialFailed
            }
            Err(e) => {
                warn!(selector = %self.selector, error = %e, kept = self.items.len(), "continuation page failed");
                self.retry_cursor = self.next.take();
                self.continuation_error = Some(e.to_string());
                ApplyOutcome::ContinuationFailed
            }
        }
    }
}

fn dedup_key(r: &Resource) -> String {
    if r.uid.is_empty() { r.key() } else { r.uid.clone() }
}

/// Run `req` on the tokio runtime and send the outcome to `tx`. Abort the
/// returned handle to cancel; a result that still arrives is discarded by
/// [`ResourceList::apply`] when its ticket is stale.
pub fn spawn_page_fetch<C>(
    paginator: Arc<Paginator<C>>,
    req: PageRequest,
    tx: mpsc::Sender<PageOutcome>,
) -> JoinHandle<()>
where
    C: ClusterAccess + ?Sized + 'static,
{
    tokio::spawn(async move {
        let result = paginator.fetch_page(&req.selector, req.cursor.as_ref(), req.page_size).await;
        if tx.send(PageOutcome { ticket: req.ticket, result }).await.is_err() {
            info!(selector = %req.selector, "page outcome receiver gone");
        }
    })
}
