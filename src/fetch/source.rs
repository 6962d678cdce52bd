//! Listing source: one HTTP GET per page

use super::cache::PageCache;
use super::types::SourceConfig;
use crate::error::Result;
use crate::http::{HttpClient, RequestConfig};
use crate::types::{JsonValue, PageNumber};
use std::sync::Arc;
use tracing::{debug, info};

/// Requests listing pages and caches successful bodies
pub struct ListingSource {
    client: HttpClient,
    config: SourceConfig,
    cache: PageCache,
}

impl ListingSource {
    /// Create a source with its own HTTP client
    pub fn new(config: SourceConfig) -> Result<Self> {
        let client = HttpClient::with_config(config.http_config())?;
        Ok(Self::with_client(client, config))
    }

    /// Create a source over an existing client
    pub fn with_client(client: HttpClient, config: SourceConfig) -> Self {
        let cache = PageCache::new(config.cache_capacity);
        Self {
            client,
            config,
            cache,
        }
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    /// Query parameters for `page`
    pub fn request_for(&self, page: PageNumber) -> RequestConfig {
        let request = self
            .config
            .query
            .iter()
            .fold(RequestConfig::new(), |req, (k, v)| req.query(k, v));

        request
            .query(&self.config.page_param, page.to_string())
            .query(&self.config.page_size_param, self.config.page_size.to_string())
    }

    /// Fetch and decode one page body.
    ///
    /// Cached bodies are returned without a request; failures are never cached.
    pub async fn fetch(&self, page: PageNumber) -> Result<Arc<JsonValue>> {
        if let Some(body) = self.cache.get(page) {
            debug!(page, "Page served from cache");
            return Ok(body);
        }

        let body: JsonValue = self
            .client
            .get_json_with_config(&self.config.base_url, self.request_for(page))
            .await?;
        info!(page, "Fetched listing page");

        let body = Arc::new(body);
        self.cache.insert(page, Arc::clone(&body));
        Ok(body)
    }
}
