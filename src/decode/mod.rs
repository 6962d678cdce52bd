//! Response decoder module
//!
//! Turns a listing response into typed rows.
//!
//! # Overview
//!
//! - [`ListingDecoder`] classifies a body as empty (end of listing) or as a
//!   list of raw records
//! - [`map_records`] converts raw records into [`QuoteRow`]s, deduplicated by
//!   stock code

mod listing;
mod rows;
mod types;

pub use listing::{ListingDecoder, DEFAULT_RECORD_PATH};
pub use rows::{capture_time, map_records, PRICE_SCALE};
pub use types::{PageContent, QuoteRow};
