//! Page fetching
//!
//! [`HarvestFetcher`] is the [`PageFetcher`](crate::pagination::PageFetcher)
//! used by real runs. For one page it:
//!
//! 1. asks [`ListingSource`] for the body (cache first, then HTTP)
//! 2. classifies it with the listing decoder; an empty page is end of data
//! 3. maps records to rows and upserts them on a pooled connection
//!
//! Any error along the way makes the page a failure.

mod cache;
mod harvester;
mod source;
mod types;

pub use cache::PageCache;
pub use harvester::HarvestFetcher;
pub use source::ListingSource;
pub use types::{PageReport, SourceConfig, DEFAULT_BASE_URL, MAX_CACHE_CAPACITY};
