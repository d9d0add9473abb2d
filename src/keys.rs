//! Deterministic mapping from (cluster, column, page-seq) to KVStore
//! coordinates (§4.3). Two mapping variants are supported; the variant is
//! a construction-time choice of sink/source, not something persisted in
//! the anchor (see DESIGN.md open question).

use crate::consts::{DEFAULT_AKEY, DEFAULT_DKEY, META_CLASS, META_OID, PAGELIST_OID};

/// A 128-bit KVStore object id, represented as the `(lo, hi)` pair the
/// driver contract exposes it as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId {
    pub lo: u64,
    pub hi: u64,
}

impl ObjectId {
    pub const fn new(lo: u64, hi: u64) -> Self {
        Self { lo, hi }
    }
}

pub const ANCHOR_OID: ObjectId = ObjectId::new(META_OID, 0);
pub const PAGELIST_BASE_OID: ObjectId = ObjectId::new(PAGELIST_OID, 0);

/// Full coordinate of a payload in the KVStore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KvCoord {
    pub oid: ObjectId,
    pub dkey: u64,
    pub akey: u64,
}

/// Build-time choice of how page payloads are grouped into KVStore objects.
/// Default is `OidPerCluster`, which groups every page of a cluster under
/// one object id (keyed by column) and lets `commitPages` batch many pages
/// of the same cluster into a single `writeV` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingVariant {
    /// `oid = (clusterId, 0)`, `dkey = columnId`, `akey = pageSeq`.
    OidPerCluster,
    /// `oid = (pageSeqNo, 0)`, `dkey = DEFAULT_DKEY`, `akey = DEFAULT_AKEY`.
    OidPerPage,
}

impl Default for MappingVariant {
    fn default() -> Self {
        MappingVariant::OidPerCluster
    }
}

/// Coordinate of the page identified by `(clusterId, columnId, pageSeq)`
/// under the dataset's default object class.
pub fn page_key(variant: MappingVariant, cluster_id: u64, column_id: u32, page_seq: u64) -> KvCoord {
    match variant {
        MappingVariant::OidPerCluster => KvCoord {
            oid: ObjectId::new(cluster_id, 0),
            dkey: column_id as u64,
            akey: page_seq,
        },
        MappingVariant::OidPerPage => KvCoord {
            oid: ObjectId::new(page_seq, 0),
            dkey: DEFAULT_DKEY,
            akey: DEFAULT_AKEY,
        },
    }
}

pub fn anchor_coord() -> (KvCoord, &'static str) {
    (
        KvCoord {
            oid: ANCHOR_OID,
            dkey: DEFAULT_DKEY,
            akey: crate::consts::ANCHOR_AKEY,
        },
        META_CLASS,
    )
}

pub fn header_coord() -> (KvCoord, &'static str) {
    (
        KvCoord {
            oid: ANCHOR_OID,
            dkey: DEFAULT_DKEY,
            akey: crate::consts::HEADER_AKEY,
        },
        META_CLASS,
    )
}

pub fn footer_coord() -> (KvCoord, &'static str) {
    (
        KvCoord {
            oid: ANCHOR_OID,
            dkey: DEFAULT_DKEY,
            akey: crate::consts::FOOTER_AKEY,
        },
        META_CLASS,
    )
}

pub fn pagelist_coord(cluster_group_seq: u64) -> (KvCoord, &'static str) {
    (
        KvCoord {
            oid: PAGELIST_BASE_OID,
            dkey: DEFAULT_DKEY,
            akey: cluster_group_seq,
        },
        META_CLASS,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oid_per_cluster_groups_by_column() {
        let a = page_key(MappingVariant::OidPerCluster, 3, 1, 0);
        let b = page_key(MappingVariant::OidPerCluster, 3, 1, 1);
        let c = page_key(MappingVariant::OidPerCluster, 3, 2, 0);
        assert_eq!(a.oid, b.oid);
        assert_eq!(a.oid, c.oid);
        assert_eq!(a.dkey, b.dkey);
        assert_ne!(a.dkey, c.dkey);
        assert_ne!(a.akey, b.akey);
    }

    #[test]
    fn oid_per_page_is_keyed_by_sequence() {
        let a = page_key(MappingVariant::OidPerPage, 3, 1, 7);
        let b = page_key(MappingVariant::OidPerPage, 9, 2, 7);
        assert_eq!(a.oid, b.oid);
        let c = page_key(MappingVariant::OidPerPage, 3, 1, 8);
        assert_ne!(a.oid, c.oid);
    }

    #[test]
    fn reserved_oids_disjoint_from_user_range() {
        assert_ne!(ANCHOR_OID, PAGELIST_BASE_OID);
        let user = page_key(MappingVariant::OidPerCluster, 0, 0, 0);
        assert_ne!(user.oid, ANCHOR_OID);
        assert_ne!(user.oid, PAGELIST_BASE_OID);
    }
}
