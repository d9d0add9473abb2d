//! Compatibility constants for the page-storage engine.
//!
//! The id/key values here are fixed the way any on-disk magic number or
//! reserved page id is fixed: any dataset written with one value must be
//! read back with the same value. Pick fresh constants only when interop
//! with an existing dataset is not required.

/// Anchor record version. Bumping this is the only sanctioned way to
/// persist a mapping-variant choice in the anchor (see open question in
/// DESIGN.md).
pub const ANCHOR_VERSION: u32 = 1;

/// Upper bound on the object-class name length accepted by the KVStore
/// driver. Mirrors the `MAX_CLASS_NAME` referenced by `Anchor::max_size`.
pub const MAX_CLASS_NAME: usize = 64;

/// Object class used for all metadata payloads (anchor/header/footer/pagelist).
pub const META_CLASS: &str = "META";

/// Reserved object id for anchor/header/footer.
pub const META_OID: u64 = u64::MAX;

/// Reserved object id for cluster-group pagelists.
pub const PAGELIST_OID: u64 = u64::MAX - 1;

/// Distribution key shared by all metadata payloads and, under
/// `OidPerPage`, by all page payloads.
pub const DEFAULT_DKEY: u64 = 0;

/// Attribute key for page payloads under `OidPerPage` mapping.
pub const DEFAULT_AKEY: u64 = 0;

pub const ANCHOR_AKEY: u64 = 1;
pub const HEADER_AKEY: u64 = 2;
pub const FOOTER_AKEY: u64 = 3;
