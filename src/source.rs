//! `Source`: reader-side attach/populate-page/prefetch path (§4.6).
//!
//! Mirrors `Sink`'s division of labor: the source resolves coordinates and
//! moves bytes, the descriptor (built by [`crate::descriptor::DescriptorBuilder`]
//! from opaque header/footer/pagelist payloads) tells it where to look.

use std::sync::Arc;

use log::debug;

use parking_lot::{Mutex, RwLock};

use crate::anchor::Anchor;
use crate::cluster_pool::ClusterPool;
use crate::codec::unseal;
use crate::config::ReaderOptions;
use crate::descriptor::{Descriptor, DescriptorBuilder};
use crate::error::Result;
use crate::keys::{anchor_coord, footer_coord, header_coord, page_key, pagelist_coord};
use crate::kvstore::{read_failed, KvContainer, KvDriver, ReadRequest};
use crate::locator::Locator;
use crate::metrics::{Metrics, TimerKind};
use crate::page::{Page, PageAllocator};
use crate::page_pool::PagePool;
use crate::scheduler::{unzip_cluster, UnzipTask};
use crate::uri::DatasetUri;

pub struct Source {
    container: Arc<dyn KvContainer>,
    options: ReaderOptions,
    object_class: String,
    descriptor: RwLock<Descriptor>,
    page_pool: PagePool,
    cluster_pool: ClusterPool,
    current_cluster: Mutex<Option<u64>>,
    metrics: Metrics,
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source").finish_non_exhaustive()
    }
}

impl Source {
    /// Opens the container at `uri`, reads the anchor, and assembles the
    /// descriptor from the header/footer/pagelists it points to (§4.6
    /// "Attach").
    pub fn attach(uri: &str, driver: Arc<dyn KvDriver>, options: ReaderOptions) -> Result<Self> {
        let parsed = DatasetUri::parse(uri)?;
        let pool = driver.open_pool(&parsed.pool)?;
        let container = pool.open_container(&parsed.container, false)?;
        let metrics = Metrics::new();

        let (a_coord, a_class) = anchor_coord();
        let mut anchor_buf = vec![0u8; Anchor::max_size()];
        metrics.record_read_attempt();
        let n = {
            let _t = metrics.timer(TimerKind::Read);
            container.read_single(a_coord, Some(a_class), &mut anchor_buf)?
        };
        metrics.record_read_success(n);
        let (anchor, _) = Anchor::deserialize(&anchor_buf, n)?;

        let mut builder = DescriptorBuilder::new();

        let header_bytes = Self::read_and_unseal(
            &container,
            header_coord(),
            anchor.n_bytes_header,
            anchor.len_header,
            &metrics,
        )?;
        builder.feed_header(header_bytes);

        let footer_bytes = Self::read_and_unseal(
            &container,
            footer_coord(),
            anchor.n_bytes_footer,
            anchor.len_footer,
            &metrics,
        )?;
        builder.feed_footer(footer_bytes);

        for (group_id, locator, uncompressed_len) in builder.cluster_group_locators() {
            let (coord, class) = pagelist_coord(group_id);
            let page_list_bytes = Self::read_and_unseal(
                &container,
                (coord, class),
                locator.bytes_on_storage as u32,
                uncompressed_len as u32,
                &metrics,
            )?;
            builder.feed_page_list(&page_list_bytes);
        }

        let descriptor = builder.finish();
        debug!(
            "attached {}/{}: {} columns, {} clusters",
            parsed.pool,
            parsed.container,
            descriptor.columns.len(),
            descriptor.clusters.len()
        );

        let cluster_pool_capacity = options.cluster_pool_capacity.max(1);
        Ok(Self {
            container,
            options,
            object_class: anchor.object_class,
            descriptor: RwLock::new(descriptor),
            page_pool: PagePool::new(metrics.clone()),
            cluster_pool: ClusterPool::new(cluster_pool_capacity, metrics.clone()),
            current_cluster: Mutex::new(None),
            metrics,
        })
    }

    /// This source's own metrics handle (§9: locally scoped, not global).
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn read_and_unseal(
        container: &Arc<dyn KvContainer>,
        (coord, class): (crate::keys::KvCoord, &str),
        n_bytes_on_storage: u32,
        uncompressed_len: u32,
        metrics: &Metrics,
    ) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n_bytes_on_storage as usize];
        metrics.record_read_attempt();
        let n = {
            let _t = metrics.timer(TimerKind::Read);
            container.read_single(coord, Some(class), &mut buf)?
        };
        metrics.record_read_success(n);
        let compressed = n_bytes_on_storage != uncompressed_len;
        unseal(&buf[..n], compressed, uncompressed_len as usize, metrics)
    }

    pub fn header_bytes(&self) -> Vec<u8> {
        self.descriptor.read().header.clone()
    }

    pub fn footer_bytes(&self) -> Vec<u8> {
        self.descriptor.read().footer.clone()
    }

    pub fn n_clusters(&self) -> u64 {
        self.descriptor.read().clusters.len() as u64
    }

    /// Populates (decompressing if needed) the page that contains
    /// `global_index` of `column_id`, going through the page pool and, if
    /// the cluster cache is enabled, the cluster-level prefetch path.
    pub fn populate_page(&self, column_id: u32, global_index: u64) -> Result<Arc<Page>> {
        let (cluster_id, page_record) = {
            let descriptor = self.descriptor.read();
            descriptor
                .locate_by_global_index(column_id, global_index)
                .ok_or_else(|| read_failed(3, "index out of range"))?
        };

        if self.options.cluster_cache_enabled {
            self.ensure_current_cluster(cluster_id)?;
        }

        let global_page_start = {
            let descriptor = self.descriptor.read();
            descriptor.column_offset(column_id, cluster_id) + page_record.first_in_page
        };

        if let Some(page) = self.page_pool.get_page(column_id, global_page_start) {
            return Ok(page);
        }

        let page = self.fetch_and_decompress_page(column_id, cluster_id, &page_record)?;
        Ok(self.page_pool.register_page(column_id, global_page_start, page))
    }

    /// Reads a single page's sealed (possibly compressed) bytes without
    /// decompressing, for callers that want the raw on-storage payload.
    pub fn load_sealed_page(
        &self,
        column_id: u32,
        cluster_id: u64,
        cluster_local_index: u64,
    ) -> Result<(Locator, Vec<u8>)> {
        let page_record = {
            let descriptor = self.descriptor.read();
            descriptor
                .locate_by_cluster_index(column_id, cluster_id, cluster_local_index)
                .ok_or_else(|| read_failed(3, "index out of range within cluster"))?
        };

        let coord = page_key(self.options.mapping_variant, cluster_id, column_id, page_record.locator.position);
        let mut buf = vec![0u8; page_record.locator.bytes_on_storage as usize];
        self.metrics.record_read_attempt();
        let n = {
            let _t = self.metrics.timer(TimerKind::Read);
            self.container
                .read_single(coord, Some(&self.object_class), &mut buf)?
        };
        self.metrics.record_read_success(n);
        buf.truncate(n);
        Ok((page_record.locator, buf))
    }

    fn fetch_and_decompress_page(
        &self,
        column_id: u32,
        cluster_id: u64,
        page_record: &crate::descriptor::PageRecord,
    ) -> Result<Page> {
        let element_size = {
            let descriptor = self.descriptor.read();
            descriptor
                .element_size(column_id)
                .ok_or_else(|| read_failed(4, "unknown column id"))?
        };
        let coord = page_key(self.options.mapping_variant, cluster_id, column_id, page_record.locator.position);
        let mut buf = vec![0u8; page_record.locator.bytes_on_storage as usize];
        self.metrics.record_read_attempt();
        let n = {
            let _t = self.metrics.timer(TimerKind::Read);
            self.container
                .read_single(coord, Some(&self.object_class), &mut buf)?
        };
        self.metrics.record_read_success(n);

        let uncompressed_len = (page_record.n_elements * element_size) as usize;
        let compressed = n != uncompressed_len;
        let bytes = unseal(&buf[..n], compressed, uncompressed_len, &self.metrics)?;

        let mut page =
            PageAllocator::new_page_with_buf(column_id, bytes, element_size, page_record.n_elements)?;
        page.cluster_id = cluster_id;
        page.first_in_page_index = page_record.first_in_page;
        page.column_offset_in_cluster = self.descriptor.read().column_offset(column_id, cluster_id);
        Ok(page)
    }

    /// Ensures cluster_id is resident and pinned as the current cluster,
    /// unpinning whatever cluster held that role before (§4.6).
    fn ensure_current_cluster(&self, cluster_id: u64) -> Result<()> {
        let mut current = self.current_cluster.lock();
        if *current == Some(cluster_id) {
            return Ok(());
        }
        if !self.cluster_pool.is_resident(cluster_id) {
            self.load_clusters(&[cluster_id])?;
        }
        if let Some(old) = *current {
            self.cluster_pool.unpin(old);
        }
        self.cluster_pool.pin(cluster_id);
        *current = Some(cluster_id);
        Ok(())
    }

    /// Prefetches every page of `cluster_ids` not already resident,
    /// decompressing them in parallel and registering results in the page
    /// pool (`unzipCluster`, §4.6).
    pub fn load_clusters(&self, cluster_ids: &[u64]) -> Result<()> {
        let to_fetch: Vec<u64> = cluster_ids
            .iter()
            .copied()
            .filter(|id| !self.cluster_pool.is_resident(*id))
            .collect();

        if !to_fetch.is_empty() {
            struct Pending {
                column_id: u32,
                cluster_id: u64,
                column_offset: u64,
                first_in_page: u64,
                n_elements: u32,
                element_size: u32,
                bytes_on_storage: u64,
            }

            let mut request: ReadRequest = ReadRequest::new();
            let mut pending: Vec<(crate::keys::ObjectId, u64, u64, Pending)> = Vec::new();

            {
                let descriptor = self.descriptor.read();
                for cluster_id in &to_fetch {
                    let Some(cluster) = descriptor.cluster(*cluster_id) else {
                        continue;
                    };
                    for column in &descriptor.columns {
                        let Some(pages) = cluster.pages.get(&column.column_id) else {
                            continue;
                        };
                        let column_offset = descriptor.column_offset(column.column_id, *cluster_id);
                        for page in pages {
                            let coord = page_key(
                                self.options.mapping_variant,
                                *cluster_id,
                                column.column_id,
                                page.locator.position,
                            );
                            request
                                .entry((coord.oid, coord.dkey))
                                .or_default()
                                .insert(coord.akey, page.locator.bytes_on_storage as usize);
                            pending.push((
                                coord.oid,
                                coord.dkey,
                                coord.akey,
                                Pending {
                                    column_id: column.column_id,
                                    cluster_id: *cluster_id,
                                    column_offset,
                                    first_in_page: page.first_in_page,
                                    n_elements: page.n_elements,
                                    element_size: column.element_size,
                                    bytes_on_storage: page.locator.bytes_on_storage,
                                },
                            ));
                        }
                    }
                }
            }

            if !pending.is_empty() {
                self.metrics.record_read_v_attempt();
                let result = {
                    let _t = self.metrics.timer(TimerKind::Read);
                    self.container.read_v(Some(&self.object_class), request)?
                };

                let mut total_bytes = 0usize;
                let mut tasks = Vec::with_capacity(pending.len());
                for (oid, dkey, akey, meta) in pending {
                    let sealed = result
                        .get(&(oid, dkey))
                        .and_then(|m| m.get(&akey))
                        .cloned()
                        .ok_or_else(|| read_failed(2, "missing key in readV result"))?;
                    total_bytes += sealed.len();
                    let uncompressed_len = (meta.n_elements * meta.element_size) as usize;
                    let compressed = meta.bytes_on_storage != uncompressed_len as u64;
                    tasks.push(UnzipTask {
                        column_id: meta.column_id,
                        cluster_id: meta.cluster_id,
                        column_offset_in_cluster: meta.column_offset,
                        first_in_page: meta.first_in_page,
                        sealed,
                        compressed,
                        uncompressed_len,
                        element_size: meta.element_size,
                        n_elements: meta.n_elements,
                    });
                }
                self.metrics.record_read_success(total_bytes);

                for result in unzip_cluster(tasks, &self.metrics) {
                    let page = result?;
                    let global_start = page.column_offset_in_cluster + page.first_in_page_index;
                    self.page_pool
                        .preload_page(page.column_id, global_start, page);
                }
            }

            for id in &to_fetch {
                self.cluster_pool.touch(*id);
            }
            self.cluster_pool.record_prefetch_batch(to_fetch.len() as u64);
        }

        for id in cluster_ids {
            self.cluster_pool.touch(*id);
        }
        Ok(())
    }
}

impl Drop for Source {
    fn drop(&mut self) {
        if let Some(id) = self.current_cluster.lock().take() {
            self.cluster_pool.unpin(id);
        }
    }
}
