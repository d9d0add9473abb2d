//! `Sink`: writer-side mapping from committed pages to KVStore coordinates
//! (§4.4–§4.5).
//!
//! The sink knows nothing about what a page, header, footer, or pagelist
//! *means* — it seals whatever bytes it is given and places them at the
//! coordinate `keys::page_key`/`keys::anchor_coord`/etc. compute. Building
//! the header/footer/pagelist payloads themselves is the caller's job (the
//! logical model, §1); [`crate::descriptor::DatasetModel`] is the reference
//! implementation of that caller this crate ships for its own tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;

use crate::anchor::Anchor;
use crate::codec::seal;
use crate::config::WriterOptions;
use crate::consts::ANCHOR_VERSION;
use crate::error::Result;
use crate::keys::{anchor_coord, footer_coord, header_coord, page_key, pagelist_coord};
use crate::kvstore::{KvContainer, KvDriver, WriteSet};
use crate::locator::Locator;
use crate::metrics::{Metrics, TimerKind};
use crate::page::Page;
use crate::uri::DatasetUri;

pub struct Sink {
    container: Arc<dyn KvContainer>,
    options: WriterOptions,
    page_seq: AtomicU64,
    cluster_id: AtomicU64,
    bytes_since_cluster_commit: AtomicU64,
    cg_seq: AtomicU64,
    metrics: Metrics,
}

impl std::fmt::Debug for Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sink").finish_non_exhaustive()
    }
}

impl Sink {
    /// Opens (creating if needed) the container at `uri` and validates the
    /// dataset's object class against the driver (§4.4 step 1, "schema
    /// commit").
    pub fn create(uri: &str, driver: Arc<dyn KvDriver>, options: WriterOptions) -> Result<Self> {
        let parsed = DatasetUri::parse(uri)?;
        let pool = driver.open_pool(&parsed.pool)?;
        let container = pool.open_container(&parsed.container, true)?;
        container.set_default_object_class(&options.object_class)?;
        debug!(
            "sink created for {}/{} with {}",
            parsed.pool, parsed.container, options
        );
        Ok(Self {
            container,
            options,
            page_seq: AtomicU64::new(0),
            cluster_id: AtomicU64::new(0),
            bytes_since_cluster_commit: AtomicU64::new(0),
            cg_seq: AtomicU64::new(0),
            metrics: Metrics::new(),
        })
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    /// This sink's own metrics handle (§9: locally scoped, not global).
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Seals and writes a single page, returning the locator the caller's
    /// pagelist must remember it by.
    pub fn commit_page(&self, column_id: u32, page: &Page) -> Result<Locator> {
        let seq = self.page_seq.fetch_add(1, Ordering::SeqCst);
        let cluster_id = self.cluster_id.load(Ordering::SeqCst);
        let sealed = seal(page.buf(), self.options.compression_level, &self.metrics);
        let coord = page_key(self.options.mapping_variant, cluster_id, column_id, seq);

        let _t = self.metrics.timer(TimerKind::Write);
        self.container
            .write_single(coord, Some(&self.options.object_class), &sealed)?;
        self.metrics.record_write_success(sealed.len());
        self.bytes_since_cluster_commit
            .fetch_add(sealed.len() as u64, Ordering::Relaxed);

        Ok(Locator {
            position: seq,
            bytes_on_storage: sealed.len() as u64,
        })
    }

    /// Seals and writes many pages of the current cluster in one `writeV`
    /// request, returning locators in the same order as `pages`.
    pub fn commit_pages(&self, pages: &[(u32, &Page)]) -> Result<Vec<Locator>> {
        if pages.is_empty() {
            return Ok(Vec::new());
        }
        let cluster_id = self.cluster_id.load(Ordering::SeqCst);
        let mut batch: WriteSet = WriteSet::new();
        let mut locators = Vec::with_capacity(pages.len());
        let mut total_bytes = 0u64;

        for (column_id, page) in pages {
            let seq = self.page_seq.fetch_add(1, Ordering::SeqCst);
            let sealed = seal(page.buf(), self.options.compression_level, &self.metrics);
            let coord = page_key(self.options.mapping_variant, cluster_id, *column_id, seq);
            let len = sealed.len() as u64;

            batch
                .entry((coord.oid, coord.dkey))
                .or_default()
                .insert(coord.akey, sealed);
            locators.push(Locator {
                position: seq,
                bytes_on_storage: len,
            });
            total_bytes += len;
        }

        let _t = self.metrics.timer(TimerKind::Write);
        self.container
            .write_v(Some(&self.options.object_class), batch)?;
        self.metrics.record_write_v_success(total_bytes as usize);
        self.bytes_since_cluster_commit
            .fetch_add(total_bytes, Ordering::Relaxed);

        Ok(locators)
    }

    /// Closes out the current cluster: advances the cluster id subsequent
    /// `commit_page(s)` calls write into, and returns the number of bytes
    /// written to page payloads since the previous call (or since
    /// construction, for the first cluster). Writes nothing itself — the
    /// pagelist describing this cluster's pages is the caller's to build
    /// and hand to `commit_cluster_group`.
    pub fn commit_cluster(&self, n_entries: u64) -> u64 {
        let bytes = self.bytes_since_cluster_commit.swap(0, Ordering::SeqCst);
        let closed = self.cluster_id.fetch_add(1, Ordering::SeqCst);
        debug!("cluster {closed} closed with {n_entries} entries, {bytes} bytes written");
        bytes
    }

    /// Seals and writes a cluster-group's serialized pagelist, returning
    /// its locator (`position` is the assigned cluster-group sequence
    /// number, which the footer must record alongside the locator).
    pub fn commit_cluster_group(&self, serialized_page_list: &[u8]) -> Result<Locator> {
        let cg_seq = self.cg_seq.fetch_add(1, Ordering::SeqCst);
        let sealed = seal(serialized_page_list, self.options.compression_level, &self.metrics);
        let (coord, class) = pagelist_coord(cg_seq);

        let _t = self.metrics.timer(TimerKind::Write);
        self.container.write_single(coord, Some(class), &sealed)?;
        self.metrics.record_write_success(sealed.len());

        Ok(Locator {
            position: cg_seq,
            bytes_on_storage: sealed.len() as u64,
        })
    }

    /// Seals and writes the header and footer, then writes the anchor that
    /// makes the dataset visible to a source (§4.4 step 5). This is the
    /// single point at which a reader attaching concurrently would see a
    /// complete, consistent dataset.
    pub fn commit_dataset(&self, header: &[u8], footer: &[u8]) -> Result<()> {
        let sealed_header = seal(header, self.options.compression_level, &self.metrics);
        let sealed_footer = seal(footer, self.options.compression_level, &self.metrics);

        let _t = self.metrics.timer(TimerKind::Write);
        let (h_coord, h_class) = header_coord();
        self.container
            .write_single(h_coord, Some(h_class), &sealed_header)?;
        self.metrics.record_write_success(sealed_header.len());

        let (f_coord, f_class) = footer_coord();
        self.container
            .write_single(f_coord, Some(f_class), &sealed_footer)?;
        self.metrics.record_write_success(sealed_footer.len());

        let anchor = Anchor {
            version: ANCHOR_VERSION,
            n_bytes_header: sealed_header.len() as u32,
            len_header: header.len() as u32,
            n_bytes_footer: sealed_footer.len() as u32,
            len_footer: footer.len() as u32,
            object_class: self.options.object_class.clone(),
        };
        let mut buf = vec![0u8; Anchor::max_size()];
        let n = anchor.serialize(Some(&mut buf));

        let (a_coord, a_class) = anchor_coord();
        self.container.write_single(a_coord, Some(a_class), &buf[..n])?;
        self.metrics.record_write_success(n);

        debug!("dataset finalized: header {} bytes, footer {} bytes", header.len(), footer.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kvstore::mem::MemKvDriver;
    use crate::page::PageAllocator;

    fn test_sink() -> Sink {
        let driver: Arc<dyn KvDriver> = Arc::new(MemKvDriver::default());
        Sink::create("kv://pool/container", driver, WriterOptions::default()).unwrap()
    }

    #[test]
    fn commit_page_assigns_monotonic_sequence() {
        let sink = test_sink();
        let page = PageAllocator::new_page(0, 4, 4).unwrap();
        let a = sink.commit_page(0, &page).unwrap();
        let b = sink.commit_page(0, &page).unwrap();
        assert_eq!(a.position, 0);
        assert_eq!(b.position, 1);
    }

    #[test]
    fn commit_cluster_resets_byte_accumulator() {
        let sink = test_sink();
        let page = PageAllocator::new_page(0, 4, 4).unwrap();
        sink.commit_page(0, &page).unwrap();
        let bytes = sink.commit_cluster(4);
        assert!(bytes > 0);
        assert_eq!(sink.commit_cluster(0), 0);
    }

    #[test]
    fn commit_pages_batches_into_one_write() {
        let sink = test_sink();
        let p0 = PageAllocator::new_page(0, 4, 4).unwrap();
        let p1 = PageAllocator::new_page(1, 4, 4).unwrap();
        let locators = sink.commit_pages(&[(0, &p0), (1, &p1)]).unwrap();
        assert_eq!(locators.len(), 2);
        assert_ne!(locators[0].position, locators[1].position);
    }

    #[test]
    fn commit_dataset_writes_anchor_header_footer() {
        let sink = test_sink();
        sink.commit_dataset(b"header-bytes", b"footer-bytes").unwrap();
    }

    #[test]
    fn unknown_object_class_rejected_at_create() {
        let driver: Arc<dyn KvDriver> = Arc::new(MemKvDriver::default());
        let opts = WriterOptions::default().with_object_class("NOPE");
        let err = Sink::create("kv://pool/container", driver, opts).unwrap_err();
        assert!(matches!(err, crate::error::Error::UnknownObjectClass(_)));
    }

    #[test]
    fn commit_pages_preserves_locator_order_at_random_batch_sizes() {
        let mut rng = oorandom::Rand64::new(0x5EED);
        for _ in 0..50 {
            let sink = test_sink();
            let n = 1 + (rng.rand_u64() % 32) as usize;
            let pages: Vec<_> = (0..n)
                .map(|i| PageAllocator::new_page((i % 4) as u32, 4, 4).unwrap())
                .collect();
            let refs: Vec<(u32, &Page)> = pages.iter().enumerate().map(|(i, p)| ((i % 4) as u32, p)).collect();
            let locators = sink.commit_pages(&refs).unwrap();
            assert_eq!(locators.len(), n);
            for (i, locator) in locators.iter().enumerate() {
                assert_eq!(locator.position, i as u64);
            }
        }
    }
}
