//! Thread-safe page pool (§4.6, §5): caches decompressed pages keyed by
//! `(columnId, index)` so a hit in `populatePage` skips decompression
//! entirely, and so `unzipCluster`'s background tasks can `PreloadPage`
//! results that become visible to the next `GetPage` call.
//!
//! The pool's eviction policy is explicitly out of scope (§1); this keeps
//! everything resident and leaves capacity-based eviction to a policy
//! layer callers can swap in.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::metrics::Metrics;
use crate::page::Page;

pub struct PagePool {
    entries: Mutex<HashMap<(u32, u64), Arc<Page>>>,
    metrics: Metrics,
}

impl PagePool {
    pub fn new(metrics: Metrics) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            metrics,
        }
    }

    /// `GetPage`: returns the cached page, if any, recording a hit/miss.
    pub fn get_page(&self, column_id: u32, index: u64) -> Option<Arc<Page>> {
        let found = self.entries.lock().get(&(column_id, index)).cloned();
        if found.is_some() {
            self.metrics.record_page_pool_hit();
        } else {
            self.metrics.record_page_pool_miss();
        }
        found
    }

    /// `RegisterPage`: inserts a freshly decompressed page from the
    /// synchronous read/populate path.
    pub fn register_page(&self, column_id: u32, index: u64, page: Page) -> Arc<Page> {
        let page = Arc::new(page);
        self.entries.lock().insert((column_id, index), page.clone());
        page
    }

    /// `PreloadPage`: same insertion, used by background decompression
    /// tasks so the result is observable to the next `GetPage`.
    pub fn preload_page(&self, column_id: u32, index: u64, page: Page) {
        self.metrics.record_page_pool_preload();
        self.entries.lock().insert((column_id, index), Arc::new(page));
    }

    /// `ReturnPage`: drops the pool's reference; the page's memory is
    /// freed once the last `Arc` holder releases it.
    pub fn return_page(&self, column_id: u32, index: u64) {
        self.entries.lock().remove(&(column_id, index));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
