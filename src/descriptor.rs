//! The in-memory descriptor tree and the descriptor builder that
//! assembles it (§4.6, glossary: Descriptor / Attach).
//!
//! The logical model and its serialization format are explicitly out of
//! scope for the core (§1): header and footer payloads are opaque
//! compressed blobs the sink/source never interpret. This module is the
//! "glue" stand-in for that external collaborator (§2, "Glue with
//! descriptor/codec/pools"): a small, concrete wire format for the
//! schema/footer/pagelist plus the builder that turns decompressed bytes
//! into the `Descriptor` the source's `populatePage` queries. A real
//! deployment swaps this module for the actual logical-model library
//! without touching sink.rs/source.rs.

use std::collections::HashMap;

use byteorder::{ByteOrder, LittleEndian};

use crate::locator::Locator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnInfo {
    pub column_id: u32,
    pub element_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRecord {
    pub locator: Locator,
    pub n_elements: u32,
    /// Cluster-local element index at which this page's data begins.
    pub first_in_page: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ClusterRecord {
    pub cluster_id: u64,
    pub n_entries: u64,
    pub pages: HashMap<u32, Vec<PageRecord>>,
}

#[derive(Debug, Clone)]
pub struct ClusterGroupRecord {
    pub group_id: u64,
    pub locator: Locator,
    /// Uncompressed size of the serialized pagelist, needed on the read
    /// side to tell a compressed frame from a stored-raw one (`locator
    /// .bytes_on_storage != uncompressed_len`).
    pub uncompressed_len: u64,
    pub cluster_ids: Vec<u64>,
}

/// The assembled descriptor a `Source` queries under a shared lock (§4.6).
#[derive(Debug, Clone, Default)]
pub struct Descriptor {
    pub columns: Vec<ColumnInfo>,
    pub clusters: Vec<ClusterRecord>,
    pub cluster_groups: Vec<ClusterGroupRecord>,
    pub header: Vec<u8>,
    pub footer: Vec<u8>,
}

impl Descriptor {
    pub fn cluster(&self, cluster_id: u64) -> Option<&ClusterRecord> {
        self.clusters.iter().find(|c| c.cluster_id == cluster_id)
    }

    /// Byte width of one element of `column_id`, if the column is known.
    pub fn element_size(&self, column_id: u32) -> Option<u32> {
        self.columns
            .iter()
            .find(|c| c.column_id == column_id)
            .map(|c| c.element_size)
    }

    /// Global element offset at which `cluster_id`'s data for `column_id`
    /// begins: the sum of that column's element counts over every earlier
    /// cluster, in commit order.
    pub fn column_offset(&self, column_id: u32, cluster_id: u64) -> u64 {
        let mut offset = 0u64;
        for cluster in &self.clusters {
            if cluster.cluster_id == cluster_id {
                break;
            }
            if let Some(pages) = cluster.pages.get(&column_id) {
                offset += pages.iter().map(|p| p.n_elements as u64).sum::<u64>();
            }
        }
        offset
    }

    /// Resolves `(columnId, globalIndex)` to the cluster and page record
    /// that contains it.
    pub fn locate_by_global_index(
        &self,
        column_id: u32,
        global_index: u64,
    ) -> Option<(u64, PageRecord)> {
        let mut offset = 0u64;
        for cluster in &self.clusters {
            let pages = cluster.pages.get(&column_id)?;
            let cluster_total: u64 = pages.iter().map(|p| p.n_elements as u64).sum();
            if global_index < offset + cluster_total {
                let local_index = global_index - offset;
                let page = pages
                    .iter()
                    .find(|p| {
                        local_index >= p.first_in_page
                            && local_index < p.first_in_page + p.n_elements as u64
                    })
                    .copied()?;
                return Some((cluster.cluster_id, page));
            }
            offset += cluster_total;
        }
        None
    }

    /// Resolves `(columnId, clusterId, clusterLocalIndex)` to its page record.
    pub fn locate_by_cluster_index(
        &self,
        column_id: u32,
        cluster_id: u64,
        cluster_local_index: u64,
    ) -> Option<PageRecord> {
        let cluster = self.cluster(cluster_id)?;
        let pages = cluster.pages.get(&column_id)?;
        pages
            .iter()
            .find(|p| {
                cluster_local_index >= p.first_in_page
                    && cluster_local_index < p.first_in_page + p.n_elements as u64
            })
            .copied()
    }
}

// ----------------------------- wire format -----------------------------
//
// Header  : u32 nColumns, then per column [u32 columnId][u32 elementSize]
// Footer  : u32 nGroups, then per group
//             [u64 groupId][u64 locatorPos][u64 locatorBytes]
//             [u32 nClusterIds][u64 clusterId ...]
// Pagelist: u32 nClusters, then per cluster
//             [u64 clusterId][u64 nEntries][u32 nColumns]
//             per column: [u32 columnId][u32 nPages]
//               per page: [u64 locatorPos][u64 locatorBytes][u32 nElements][u64 firstInPage]

pub fn serialize_header(columns: &[ColumnInfo]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + columns.len() * 8);
    write_u32(&mut buf, columns.len() as u32);
    for c in columns {
        write_u32(&mut buf, c.column_id);
        write_u32(&mut buf, c.element_size);
    }
    buf
}

pub fn deserialize_header(buf: &[u8]) -> Vec<ColumnInfo> {
    let mut cur = 0usize;
    let n = read_u32(buf, &mut cur);
    (0..n)
        .map(|_| ColumnInfo {
            column_id: read_u32(buf, &mut cur),
            element_size: read_u32(buf, &mut cur),
        })
        .collect()
}

pub fn serialize_footer(groups: &[ClusterGroupRecord]) -> Vec<u8> {
    let mut buf = Vec::new();
    write_u32(&mut buf, groups.len() as u32);
    for g in groups {
        write_u64(&mut buf, g.group_id);
        write_u64(&mut buf, g.locator.position);
        write_u64(&mut buf, g.locator.bytes_on_storage);
        write_u64(&mut buf, g.uncompressed_len);
        write_u32(&mut buf, g.cluster_ids.len() as u32);
        for id in &g.cluster_ids {
            write_u64(&mut buf, *id);
        }
    }
    buf
}

pub fn deserialize_footer(buf: &[u8]) -> Vec<ClusterGroupRecord> {
    let mut cur = 0usize;
    let n = read_u32(buf, &mut cur);
    (0..n)
        .map(|_| {
            let group_id = read_u64(buf, &mut cur);
            let position = read_u64(buf, &mut cur);
            let bytes_on_storage = read_u64(buf, &mut cur);
            let uncompressed_len = read_u64(buf, &mut cur);
            let n_ids = read_u32(buf, &mut cur);
            let cluster_ids = (0..n_ids).map(|_| read_u64(buf, &mut cur)).collect();
            ClusterGroupRecord {
                group_id,
                locator: Locator {
                    position,
                    bytes_on_storage,
                },
                uncompressed_len,
                cluster_ids,
            }
        })
        .collect()
}

pub fn serialize_page_list(clusters: &[ClusterRecord]) -> Vec<u8> {
    let mut buf = Vec::new();
    write_u32(&mut buf, clusters.len() as u32);
    for cluster in clusters {
        write_u64(&mut buf, cluster.cluster_id);
        write_u64(&mut buf, cluster.n_entries);
        write_u32(&mut buf, cluster.pages.len() as u32);
        let mut column_ids: Vec<&u32> = cluster.pages.keys().collect();
        column_ids.sort();
        for column_id in column_ids {
            let pages = &cluster.pages[column_id];
            write_u32(&mut buf, *column_id);
            write_u32(&mut buf, pages.len() as u32);
            for p in pages {
                write_u64(&mut buf, p.locator.position);
                write_u64(&mut buf, p.locator.bytes_on_storage);
                write_u32(&mut buf, p.n_elements);
                write_u64(&mut buf, p.first_in_page);
            }
        }
    }
    buf
}

pub fn deserialize_page_list(buf: &[u8]) -> Vec<ClusterRecord> {
    let mut cur = 0usize;
    let n_clusters = read_u32(buf, &mut cur);
    (0..n_clusters)
        .map(|_| {
            let cluster_id = read_u64(buf, &mut cur);
            let n_entries = read_u64(buf, &mut cur);
            let n_columns = read_u32(buf, &mut cur);
            let mut pages = HashMap::new();
            for _ in 0..n_columns {
                let column_id = read_u32(buf, &mut cur);
                let n_pages = read_u32(buf, &mut cur);
                let entries = (0..n_pages)
                    .map(|_| {
                        let position = read_u64(buf, &mut cur);
                        let bytes_on_storage = read_u64(buf, &mut cur);
                        let n_elements = read_u32(buf, &mut cur);
                        let first_in_page = read_u64(buf, &mut cur);
                        PageRecord {
                            locator: Locator {
                                position,
                                bytes_on_storage,
                            },
                            n_elements,
                            first_in_page,
                        }
                    })
                    .collect();
                pages.insert(column_id, entries);
            }
            ClusterRecord {
                cluster_id,
                n_entries,
                pages,
            }
        })
        .collect()
}

fn write_u32(buf: &mut Vec<u8>, v: u32) {
    let mut tmp = [0u8; 4];
    LittleEndian::write_u32(&mut tmp, v);
    buf.extend_from_slice(&tmp);
}

fn write_u64(buf: &mut Vec<u8>, v: u64) {
    let mut tmp = [0u8; 8];
    LittleEndian::write_u64(&mut tmp, v);
    buf.extend_from_slice(&tmp);
}

fn read_u32(buf: &[u8], cur: &mut usize) -> u32 {
    let v = LittleEndian::read_u32(&buf[*cur..*cur + 4]);
    *cur += 4;
    v
}

fn read_u64(buf: &[u8], cur: &mut usize) -> u64 {
    let v = LittleEndian::read_u64(&buf[*cur..*cur + 8]);
    *cur += 8;
    v
}

/// Read-side assembly: feed decompressed anchor-adjacent payloads in, get
/// a `Descriptor` out. Mirrors the order `attach()` drives it in (§4.6).
#[derive(Debug, Default)]
pub struct DescriptorBuilder {
    header: Vec<u8>,
    footer: Vec<u8>,
    columns: Vec<ColumnInfo>,
    cluster_groups: Vec<ClusterGroupRecord>,
    clusters: Vec<ClusterRecord>,
}

impl DescriptorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed_header(&mut self, bytes: Vec<u8>) {
        self.columns = deserialize_header(&bytes);
        self.header = bytes;
    }

    pub fn feed_footer(&mut self, bytes: Vec<u8>) {
        self.cluster_groups = deserialize_footer(&bytes);
        self.footer = bytes;
    }

    /// The locators `attach()` must read pagelists from, in footer order,
    /// together with each pagelist's uncompressed length.
    pub fn cluster_group_locators(&self) -> Vec<(u64, Locator, u64)> {
        self.cluster_groups
            .iter()
            .map(|g| (g.group_id, g.locator, g.uncompressed_len))
            .collect()
    }

    pub fn feed_page_list(&mut self, bytes: &[u8]) {
        self.clusters.extend(deserialize_page_list(bytes));
    }

    pub fn finish(mut self) -> Descriptor {
        self.clusters.sort_by_key(|c| c.cluster_id);
        Descriptor {
            columns: self.columns,
            clusters: self.clusters,
            cluster_groups: self.cluster_groups,
            header: self.header,
            footer: self.footer,
        }
    }
}

/// Write-side bookkeeping: the thing that calls `Sink::commitPage(s)`,
/// accumulates the returned locators, and eventually produces the
/// `serializedHeader`/`serializedPageList`/`serializedFooter` buffers
/// `Sink` expects (§4.4, §4.5). A caller driving a `Sink` directly is free
/// to use its own model instead; this one exists so the crate is
/// end-to-end runnable on its own.
#[derive(Debug, Default)]
pub struct DatasetModel {
    columns: Vec<ColumnInfo>,
    clusters: Vec<ClusterRecord>,
    cluster_groups: Vec<ClusterGroupRecord>,
    current: ClusterRecord,
}

impl DatasetModel {
    pub fn new(columns: Vec<ColumnInfo>) -> Self {
        Self {
            columns,
            clusters: Vec::new(),
            cluster_groups: Vec::new(),
            current: ClusterRecord::default(),
        }
    }

    pub fn serialized_header(&self) -> Vec<u8> {
        serialize_header(&self.columns)
    }

    pub fn current_cluster_id(&self) -> u64 {
        self.clusters.len() as u64
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Records a committed page's locator against the current (not yet
    /// sealed) cluster.
    pub fn record_page(&mut self, column_id: u32, locator: Locator, n_elements: u32) {
        let pages = self.current.pages.entry(column_id).or_default();
        let first_in_page = pages.iter().map(|p| p.n_elements as u64).sum();
        pages.push(PageRecord {
            locator,
            n_elements,
            first_in_page,
        });
        self.current.n_entries = self
            .current
            .pages
            .values()
            .map(|p| p.iter().map(|r| r.n_elements as u64).sum::<u64>())
            .max()
            .unwrap_or(0);
    }

    /// Seals the in-progress cluster and returns its serialized pagelist
    /// bytes, ready for `Sink::commitClusterGroup`.
    pub fn seal_cluster_group(&mut self) -> Vec<u8> {
        let cluster_id = self.clusters.len() as u64;
        let mut sealed = std::mem::take(&mut self.current);
        sealed.cluster_id = cluster_id;
        let bytes = serialize_page_list(std::slice::from_ref(&sealed));
        self.clusters.push(sealed);
        bytes
    }

    pub fn register_cluster_group(
        &mut self,
        group_id: u64,
        locator: Locator,
        uncompressed_len: u64,
        cluster_ids: Vec<u64>,
    ) {
        self.cluster_groups.push(ClusterGroupRecord {
            group_id,
            locator,
            uncompressed_len,
            cluster_ids,
        });
    }

    pub fn serialized_footer(&self) -> Vec<u8> {
        serialize_footer(&self.cluster_groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let cols = vec![
            ColumnInfo { column_id: 0, element_size: 4 },
            ColumnInfo { column_id: 1, element_size: 8 },
        ];
        let bytes = serialize_header(&cols);
        assert_eq!(deserialize_header(&bytes), cols);
    }

    #[test]
    fn page_list_round_trip_and_lookup() {
        let mut pages = HashMap::new();
        pages.insert(
            0,
            vec![
                PageRecord { locator: Locator { position: 0, bytes_on_storage: 16 }, n_elements: 4, first_in_page: 0 },
                PageRecord { locator: Locator { position: 1, bytes_on_storage: 8 }, n_elements: 2, first_in_page: 4 },
            ],
        );
        let cluster = ClusterRecord { cluster_id: 0, n_entries: 6, pages };
        let bytes = serialize_page_list(&[cluster.clone()]);
        let back = deserialize_page_list(&bytes);
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].pages[&0].len(), 2);

        let descriptor = Descriptor {
            columns: vec![ColumnInfo { column_id: 0, element_size: 4 }],
            clusters: back,
            cluster_groups: vec![],
            header: vec![],
            footer: vec![],
        };
        let (cluster_id, page) = descriptor.locate_by_global_index(0, 5).unwrap();
        assert_eq!(cluster_id, 0);
        assert_eq!(page.locator.position, 1);
    }

    #[test]
    fn dataset_model_tracks_cluster_offsets() {
        let mut model = DatasetModel::new(vec![ColumnInfo { column_id: 0, element_size: 4 }]);
        model.record_page(0, Locator { position: 0, bytes_on_storage: 16 }, 4);
        let _ = model.seal_cluster_group();
        model.record_page(0, Locator { position: 1, bytes_on_storage: 16 }, 4);
        let _ = model.seal_cluster_group();

        let descriptor = Descriptor {
            columns: model.columns.clone(),
            clusters: model.clusters.clone(),
            cluster_groups: vec![],
            header: vec![],
            footer: vec![],
        };
        assert_eq!(descriptor.column_offset(0, 1), 4);
    }
}
