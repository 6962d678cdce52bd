//! Page fetcher that harvests one page into the store

use super::source::ListingSource;
use super::types::PageReport;
use crate::decode::{capture_time, map_records, ListingDecoder, PageContent};
use crate::error::Result;
use crate::pagination::{PageFetcher, PageStatus};
use crate::store::{upsert_rows, ConnectionPool, StoreConfig};
use crate::types::PageNumber;
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Fetches, decodes and upserts listing pages
pub struct HarvestFetcher {
    source: ListingSource,
    decoder: ListingDecoder,
    pool: ConnectionPool,
    table: String,
    upsert_batch_size: usize,
}

impl HarvestFetcher {
    pub fn new(source: ListingSource, pool: ConnectionPool, store: &StoreConfig) -> Self {
        Self {
            source,
            decoder: ListingDecoder::new(),
            pool,
            table: store.table.clone(),
            upsert_batch_size: store.upsert_batch_size,
        }
    }

    pub fn source(&self) -> &ListingSource {
        &self.source
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Harvest a single page, surfacing any error
    pub async fn harvest_page(&self, page: PageNumber) -> Result<PageReport> {
        let body = self.source.fetch(page).await?;

        let records = match self.decoder.decode(&body)? {
            PageContent::Empty => {
                info!(page, "Listing exhausted");
                return Ok(PageReport::EndOfData);
            }
            PageContent::Records(records) => records,
        };

        let rows = map_records(&records, capture_time());
        let record_count = records.len();
        let table = self.table.clone();
        let chunk = self.upsert_batch_size;

        let written = self
            .pool
            .with_writer(move |conn| upsert_rows(conn, &table, &rows, chunk))
            .await?;

        debug!(page, records = record_count, rows = written, "Page stored");
        Ok(PageReport::Stored {
            records: record_count,
            rows: written,
        })
    }
}

#[async_trait]
impl PageFetcher for HarvestFetcher {
    async fn fetch_page(&self, page: PageNumber) -> PageStatus {
        match self.harvest_page(page).await {
            Ok(PageReport::EndOfData) => PageStatus::EndOfData,
            Ok(PageReport::Stored { rows, .. }) => {
                info!(page, rows, "Page harvested");
                PageStatus::Success
            }
            Err(e) => {
                warn!(page, error = %e, "Page attempt failed");
                PageStatus::Failure
            }
        }
    }
}
