//! HTTP client module
//!
//! Provides the HTTP client used to pull listing pages.
//!
//! # Features
//!
//! - **Automatic Retries**: Configurable retry logic with backoff
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Backoff Strategies**: Constant, linear, and exponential backoff

mod client;
mod rate_limit;

pub use client::{HttpClient, HttpClientConfig, RequestConfig, DEFAULT_USER_AGENT};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
