//! Size-bounded page cache
//!
//! Least-recently-used eviction over page numbers. Shared by every concurrent
//! attempt, so all access goes through one mutex; entries are `Arc`s and the
//! lock is never held across an await.

use crate::types::{JsonValue, PageNumber};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

/// LRU cache of decoded page bodies
#[derive(Debug)]
pub struct PageCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<PageNumber, Arc<JsonValue>>,
    /// Front is least recently used
    order: VecDeque<PageNumber>,
    hits: u64,
    misses: u64,
}

impl CacheInner {
    /// Linear in the number of cached pages; capacity is capped in config
    fn touch(&mut self, page: PageNumber) {
        if let Some(pos) = self.order.iter().position(|p| *p == page) {
            self.order.remove(pos);
        }
        self.order.push_back(page);
    }
}

impl PageCache {
    /// Create a cache holding at most `capacity` pages; 0 disables it
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    /// Look up a page, marking it recently used
    pub fn get(&self, page: PageNumber) -> Option<Arc<JsonValue>> {
        if !self.is_enabled() {
            return None;
        }
        let mut inner = self.lock();
        match inner.entries.get(&page).cloned() {
            Some(body) => {
                inner.hits += 1;
                inner.touch(page);
                Some(body)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Store a page body, evicting the least recently used page when full
    pub fn insert(&self, page: PageNumber, body: Arc<JsonValue>) {
        if !self.is_enabled() {
            return;
        }
        let mut inner = self.lock();
        if inner.entries.insert(page, body).is_none() && inner.entries.len() > self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.entries.remove(&evicted);
            }
        }
        inner.touch(page);
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(hits, misses)` since creation
    pub fn stats(&self) -> (u64, u64) {
        let inner = self.lock();
        (inner.hits, inner.misses)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PageCache {
    fn default() -> Self {
        Self::new(100)
    }
}
