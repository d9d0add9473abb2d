//! Parallel decompression for `unzipCluster` (§4.6).
//!
//! The task scheduler proper is an external collaborator (§1); what the
//! core owns is the unit of work it hands the scheduler — decompress one
//! sealed page into a `Page` — and running a batch of those concurrently.
//! `rayon`'s work-stealing pool plays that scheduler's role here, the way
//! illinoisdata-airindex-public farms out its index-segment decoding.

use rayon::prelude::*;

use crate::codec::unseal;
use crate::error::Result;
use crate::metrics::Metrics;
use crate::page::{Page, PageAllocator};

/// One page's worth of decompression work, addressed by the window
/// (`columnOffsetInCluster + firstInPage`) the result is registered under.
pub struct UnzipTask {
    pub column_id: u32,
    pub cluster_id: u64,
    pub column_offset_in_cluster: u64,
    pub first_in_page: u64,
    pub sealed: Vec<u8>,
    pub compressed: bool,
    pub uncompressed_len: usize,
    pub element_size: u32,
    pub n_elements: u32,
}

/// Decompresses every task in `tasks` concurrently, returning one result
/// per task in the same order. A single corrupt page does not abort its
/// siblings — each slot carries its own `Result`.
pub fn unzip_cluster(tasks: Vec<UnzipTask>, metrics: &Metrics) -> Vec<Result<Page>> {
    tasks
        .into_par_iter()
        .map(|t| {
            let bytes = unseal(&t.sealed, t.compressed, t.uncompressed_len, metrics)?;
            let mut page =
                PageAllocator::new_page_with_buf(t.column_id, bytes, t.element_size, t.n_elements)?;
            page.cluster_id = t.cluster_id;
            page.column_offset_in_cluster = t.column_offset_in_cluster;
            page.first_in_page_index = t.first_in_page;
            Ok(page)
        })
        .collect()
}
