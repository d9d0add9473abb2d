//! Columnar page-storage engine mapping a logical, page-addressed ntuple
//! dataset onto a distributed object-store KVStore.
//!
//! A [`sink::Sink`] writes pages/headers/footers/pagelists under
//! deterministic [`keys`] coordinates; a [`source::Source`] attaches to a
//! previously written dataset and serves `populatePage` lookups, backed by
//! a [`page_pool::PagePool`] and a [`cluster_pool::ClusterPool`] for
//! sequential-access prefetch. [`kvstore`] defines the driver contract the
//! core consumes; [`descriptor`] is the concrete stand-in for the
//! out-of-scope logical model that builds and parses header/footer/pagelist
//! payloads.

pub mod anchor;
pub mod cluster_pool;
pub mod codec;
pub mod config;
pub mod consts;
pub mod descriptor;
pub mod error;
pub mod keys;
pub mod kvstore;
pub mod locator;
pub mod metrics;
pub mod page;
pub mod page_pool;
pub mod scheduler;
pub mod sink;
pub mod source;
pub mod uri;

pub use config::{ReaderOptions, WriterOptions};
pub use error::{Error, Result};
pub use keys::MappingVariant;
pub use sink::Sink;
pub use source::Source;
pub use uri::DatasetUri;
