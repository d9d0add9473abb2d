//! Logical pages and the allocator that owns their backing memory (§4.7).
//!
//! `Page` is a fixed-size byte run plus the metadata needed to place it
//! back into its column/cluster. Ownership of the buffer is explicit (the
//! allocator hands it out, `Page`'s `Drop` releases it) because the page
//! pool and background unzip tasks both hold onto pages after the call
//! that produced them returns.

use crate::error::{Error, Result};

/// An in-memory, decompressed column page.
#[derive(Debug)]
pub struct Page {
    buf: Vec<u8>,
    pub column_id: u32,
    pub element_size: u32,
    pub n_elements: u32,
    pub first_in_page_index: u64,
    pub cluster_id: u64,
    pub column_offset_in_cluster: u64,
}

impl Page {
    pub fn buf(&self) -> &[u8] {
        &self.buf
    }

    pub fn buf_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn byte_len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_null(&self) -> bool {
        self.buf.is_empty() && self.n_elements == 0
    }

    /// Window this page occupies within its cluster/column, as consumed
    /// by `unzipCluster` when registering a decompressed page with the
    /// page pool (§4.6).
    pub fn window(&self) -> (u64, (u64, u64)) {
        (
            self.column_offset_in_cluster + self.first_in_page_index,
            (self.cluster_id, self.column_offset_in_cluster),
        )
    }
}

/// Stateless factory for `Page` buffers. Kept as a distinct type (rather
/// than a free function) so a caller can swap in an arena/pooled allocator
/// without touching sink/source code, mirroring the page pool's own
/// pluggable-deleter design.
#[derive(Debug, Default, Clone, Copy)]
pub struct PageAllocator;

impl PageAllocator {
    /// Takes ownership of `buf` as the page's backing storage.
    pub fn new_page_with_buf(
        column_id: u32,
        buf: Vec<u8>,
        element_size: u32,
        n_elements: u32,
    ) -> Result<Page> {
        if n_elements == 0 {
            return Err(Error::EmptyPage);
        }
        Ok(Page {
            buf,
            column_id,
            element_size,
            n_elements,
            first_in_page_index: 0,
            cluster_id: 0,
            column_offset_in_cluster: 0,
        })
    }

    /// Allocates `element_size * n_elements` zeroed bytes for a fresh page.
    pub fn new_page(column_id: u32, element_size: u32, n_elements: u32) -> Result<Page> {
        if n_elements == 0 {
            return Err(Error::EmptyPage);
        }
        let cap = element_size as usize * n_elements as usize;
        Self::new_page_with_buf(column_id, vec![0u8; cap], element_size, n_elements)
    }

    /// Releases a page's buffer. Rust's `Drop` does this automatically;
    /// this entry point exists so callers that model an explicit
    /// deleter (the page pool's registration callback) have something to
    /// call without reaching into `Drop` semantics.
    pub fn delete_page(_page: Page) {}
}
