//! Centralized configuration for sink/source construction.
//!
//! The core does not read environment variables itself (§6); every tunable
//! is set through these builders so a caller's configuration is explicit
//! and reproducible.

use std::fmt;

use crate::keys::MappingVariant;

/// Options bound at sink construction (§4.4).
#[derive(Clone, Debug)]
pub struct WriterOptions {
    /// zstd compression level used to seal header/footer/pagelist/pages.
    /// `0` disables compression (the sealed buffer equals the input).
    pub compression_level: i32,

    /// Object class requested for the container's pages. Rejected at
    /// `create()` time with `UnknownObjectClass` if the driver does not
    /// recognize it.
    pub object_class: String,

    pub mapping_variant: MappingVariant,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            compression_level: 0,
            object_class: "DEFAULT".to_string(),
            mapping_variant: MappingVariant::default(),
        }
    }
}

impl WriterOptions {
    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    pub fn with_object_class(mut self, class: impl Into<String>) -> Self {
        self.object_class = class.into();
        self
    }

    pub fn with_mapping_variant(mut self, variant: MappingVariant) -> Self {
        self.mapping_variant = variant;
        self
    }
}

impl fmt::Display for WriterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "WriterOptions {{ compression_level: {}, object_class: {:?}, mapping_variant: {:?} }}",
            self.compression_level, self.object_class, self.mapping_variant
        )
    }
}

/// Options bound at source construction (§4.6). The mapping variant here
/// must match whatever the writer used — the anchor does not record it
/// (see DESIGN.md open question).
#[derive(Clone, Debug)]
pub struct ReaderOptions {
    pub mapping_variant: MappingVariant,

    /// Disables the cluster cache entirely: `populatePage` always issues a
    /// direct single-key read instead of pulling a whole cluster.
    pub cluster_cache_enabled: bool,

    /// Upper bound on clusters pinned by the cluster pool at once.
    pub cluster_pool_capacity: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            mapping_variant: MappingVariant::default(),
            cluster_cache_enabled: true,
            cluster_pool_capacity: 8,
        }
    }
}

impl ReaderOptions {
    pub fn with_mapping_variant(mut self, variant: MappingVariant) -> Self {
        self.mapping_variant = variant;
        self
    }

    pub fn with_cluster_cache_enabled(mut self, on: bool) -> Self {
        self.cluster_cache_enabled = on;
        self
    }

    pub fn with_cluster_pool_capacity(mut self, cap: usize) -> Self {
        self.cluster_pool_capacity = cap;
        self
    }
}
