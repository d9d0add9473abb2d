//! Error kinds surfaced by the core. Every public sink/source operation
//! returns one of these instead of panicking or asserting.

use std::fmt;

/// A driver error code converted to a human-readable string by the
/// KVStore implementation, as required by the driver contract (§6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError {
    pub code: i32,
    pub message: String,
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "driver error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for DriverError {}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid URI {0:?}, expected kv://<pool>/<container>")]
    InvalidUri(String),

    #[error("object class {0:?} not recognized by the KVStore driver")]
    UnknownObjectClass(String),

    #[error("anchor buffer too short: {len} bytes, need at least 20")]
    AnchorTooShort { len: usize },

    #[error("anchor decode failed: {0}")]
    AnchorDecodeFailed(String),

    #[error("write failed: {0}")]
    WriteFailed(#[source] DriverError),

    #[error("read failed: {0}")]
    ReadFailed(#[source] DriverError),

    #[error("page has zero elements")]
    EmptyPage,

    #[error("corrupt page: on-storage size {on_storage} does not match descriptor size {expected}")]
    Corrupt { on_storage: usize, expected: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
