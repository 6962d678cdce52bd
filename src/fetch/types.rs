//! Fetch types

use crate::http::{HttpClientConfig, RateLimiterConfig, DEFAULT_USER_AGENT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Listing endpoint used when no base URL is configured
pub const DEFAULT_BASE_URL: &str = "https://push2.eastmoney.com/api/qt/clist/get";

/// Largest accepted `cache_capacity`; recency updates scan the LRU order
pub const MAX_CACHE_CAPACITY: usize = 1_000;

/// Market filter: SZ main board, SZ SME, SH main board, SH STAR, BJ
const DEFAULT_MARKETS: &str = "m:0+t:6,m:0+t:80,m:1+t:2,m:1+t:23,m:0+t:81+s:2048";

const DEFAULT_FIELDS: &str =
    "f12,f13,f14,f1,f2,f4,f3,f152,f5,f6,f7,f15,f18,f16,f17,f10,f8,f9,f20,f23";

/// Where and how listing pages are requested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,

    /// Query parameter carrying the page number
    pub page_param: String,

    /// Query parameter carrying the page size
    pub page_size_param: String,

    pub page_size: u32,

    /// Fixed query parameters sent with every page
    pub query: BTreeMap<String, String>,

    pub user_agent: String,

    pub timeout_secs: u64,

    /// Retries per request inside the HTTP client
    pub max_retries: u32,

    /// Shared request rate across all attempts; 0 disables limiting
    pub requests_per_second: u32,

    /// Responses kept in the page cache; 0 disables caching, at most
    /// [`MAX_CACHE_CAPACITY`]
    pub cache_capacity: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        let query = [
            ("np", "1"),
            ("fltt", "1"),
            ("invt", "2"),
            ("fs", DEFAULT_MARKETS),
            ("fields", DEFAULT_FIELDS),
            ("fid", "f3"),
            ("po", "1"),
            ("dect", "1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_param: "pn".to_string(),
            page_size_param: "pz".to_string(),
            page_size: 20,
            query,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 10,
            max_retries: 2,
            requests_per_second: 5,
            cache_capacity: 100,
        }
    }
}

impl SourceConfig {
    /// Set base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set retries per request
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set request rate; 0 disables limiting
    #[must_use]
    pub fn with_requests_per_second(mut self, rps: u32) -> Self {
        self.requests_per_second = rps;
        self
    }

    /// Set cache capacity
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// HTTP client settings for this source
    pub fn http_config(&self) -> HttpClientConfig {
        let mut builder = HttpClientConfig::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .max_retries(self.max_retries)
            .user_agent(self.user_agent.clone());

        builder = if self.requests_per_second == 0 {
            builder.no_rate_limit()
        } else {
            builder.rate_limit(RateLimiterConfig::new(
                self.requests_per_second,
                self.requests_per_second,
            ))
        };

        builder.build()
    }
}

/// What happened to one harvested page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageReport {
    /// The listing has no more records
    EndOfData,
    /// Records were decoded and written
    Stored { records: usize, rows: usize },
}
