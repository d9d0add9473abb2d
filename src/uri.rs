//! Parser for `kv://<pool>/<container>` dataset URIs.

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetUri {
    pub pool: String,
    pub container: String,
}

const SCHEME: &str = "kv://";

impl DatasetUri {
    pub fn parse(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix(SCHEME)
            .ok_or_else(|| Error::InvalidUri(uri.to_string()))?;

        let mut parts = rest.splitn(2, '/');
        let pool = parts.next().unwrap_or("");
        let container = parts.next().unwrap_or("");

        if pool.is_empty() || container.is_empty() || container.contains('/') {
            return Err(Error::InvalidUri(uri.to_string()));
        }

        Ok(Self {
            pool: pool.to_string(),
            container: container.to_string(),
        })
    }
}
