//! driftscope store: paginated aggregation of custom resources
//!
//! [`Paginator`] turns raw cluster pages into classified [`Resource`]s;
//! [`ResourceList`] holds the incrementally loaded prefix for interactive
//! consumers and guards against stale or overlapping fetches.
//!
//! [`Resource`]: driftscope_core::Resource

#![forbid(unsafe_code)]

pub mod list;
mod paginate;

pub use list::{spawn_page_fetch, ApplyOutcome, PageOutcome, PageRequest, PageTicket, ResourceList, LOOKAHEAD_ROWS};
pub use paginate::{FetchError, Page, PageCursor, Paginator, DEFAULT_PAGE_SIZE};
