//! `Locator` — the `{position, bytesOnStorage}` pair descriptors use to
//! find a payload (page or pagelist) in the KVStore.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locator {
    /// For pages: the monotonically assigned page sequence number
    /// (the attribute key under `OidPerCluster`). For pagelists: the
    /// cluster-group sequence number.
    pub position: u64,
    /// On-storage (compressed) size in bytes.
    pub bytes_on_storage: u64,
}
