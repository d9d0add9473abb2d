//! KVStore driver contract consumed by the core (§6). This module defines
//! the trait surface only; the actual network/transport driver is an
//! external collaborator. [`mem::MemKvDriver`] is an in-process
//! implementation used by the test suite and by callers who want to
//! exercise the sink/source without a real cluster.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{DriverError, Error, Result};
use crate::keys::KvCoord;

pub type Akey = u64;

/// `map<(oid,dkey), map<akey, iov>>` grouped write request.
pub type WriteSet = HashMap<(crate::keys::ObjectId, u64), HashMap<Akey, Vec<u8>>>;

/// `map<(oid,dkey), map<akey, expected-length>>` grouped read request.
pub type ReadRequest = HashMap<(crate::keys::ObjectId, u64), HashMap<Akey, usize>>;

/// `map<(oid,dkey), map<akey, iov>>` grouped read result.
pub type ReadResult = HashMap<(crate::keys::ObjectId, u64), HashMap<Akey, Vec<u8>>>;

pub trait KvDriver: Send + Sync {
    fn open_pool(&self, pool: &str) -> Result<Arc<dyn KvPool>>;
}

pub trait KvPool: Send + Sync {
    fn open_container(&self, container: &str, create_if_missing: bool) -> Result<Arc<dyn KvContainer>>;
}

/// An opened container: the single KVStore handle sink/source hold for
/// the lifetime of the dataset.
pub trait KvContainer: Send + Sync {
    /// Sets the container's default object class, returning
    /// `UnknownObjectClass` if the driver does not recognize `class`.
    fn set_default_object_class(&self, class: &str) -> Result<()>;

    fn write_single(&self, coord: KvCoord, obj_class: Option<&str>, buf: &[u8]) -> Result<()>;

    /// Reads into `buf`, returning the number of bytes actually stored at
    /// `coord` (which may be less than `buf.len()`).
    fn read_single(&self, coord: KvCoord, obj_class: Option<&str>, buf: &mut [u8]) -> Result<usize>;

    fn write_v(&self, obj_class: Option<&str>, batch: WriteSet) -> Result<()>;

    fn read_v(&self, obj_class: Option<&str>, request: ReadRequest) -> Result<ReadResult>;
}

pub(crate) fn driver_err(code: i32, message: impl Into<String>) -> DriverError {
    DriverError {
        code,
        message: message.into(),
    }
}

pub(crate) fn write_failed(code: i32, message: impl Into<String>) -> Error {
    Error::WriteFailed(driver_err(code, message))
}

pub(crate) fn read_failed(code: i32, message: impl Into<String>) -> Error {
    Error::ReadFailed(driver_err(code, message))
}

pub mod mem {
    //! In-process KVStore double: a two-level map behind a mutex, exactly
    //! the shape the driver contract describes. Good enough to drive the
    //! sink/source through every scenario in §8 without a real cluster.

    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct ContainerState {
        objects: HashMap<(crate::keys::ObjectId, u64), HashMap<Akey, Vec<u8>>>,
        default_class: Option<String>,
    }

    pub struct MemContainer {
        known_classes: HashSet<String>,
        state: Mutex<ContainerState>,
    }

    impl KvContainer for MemContainer {
        fn set_default_object_class(&self, class: &str) -> Result<()> {
            if !self.known_classes.contains(class) {
                return Err(Error::UnknownObjectClass(class.to_string()));
            }
            self.state.lock().default_class = Some(class.to_string());
            Ok(())
        }

        fn write_single(&self, coord: KvCoord, _obj_class: Option<&str>, buf: &[u8]) -> Result<()> {
            let mut st = self.state.lock();
            st.objects
                .entry((coord.oid, coord.dkey))
                .or_default()
                .insert(coord.akey, buf.to_vec());
            Ok(())
        }

        fn read_single(&self, coord: KvCoord, _obj_class: Option<&str>, buf: &mut [u8]) -> Result<usize> {
            let st = self.state.lock();
            let value = st
                .objects
                .get(&(coord.oid, coord.dkey))
                .and_then(|m| m.get(&coord.akey))
                .ok_or_else(|| read_failed(2, "key not found"))?;
            let n = value.len().min(buf.len());
            buf[..n].copy_from_slice(&value[..n]);
            Ok(value.len())
        }

        fn write_v(&self, _obj_class: Option<&str>, batch: WriteSet) -> Result<()> {
            let mut st = self.state.lock();
            for (coord_key, akeys) in batch {
                let entry = st.objects.entry(coord_key).or_default();
                for (akey, bytes) in akeys {
                    entry.insert(akey, bytes);
                }
            }
            Ok(())
        }

        fn read_v(&self, _obj_class: Option<&str>, request: ReadRequest) -> Result<ReadResult> {
            let st = self.state.lock();
            let mut out = ReadResult::new();
            for (coord_key, akeys) in request {
                let mut resolved = HashMap::new();
                for (akey, _len) in akeys {
                    let bytes = st
                        .objects
                        .get(&coord_key)
                        .and_then(|m| m.get(&akey))
                        .ok_or_else(|| read_failed(2, "key not found in readV"))?;
                    resolved.insert(akey, bytes.clone());
                }
                out.insert(coord_key, resolved);
            }
            Ok(out)
        }
    }

    pub struct MemPool {
        known_classes: HashSet<String>,
        containers: Mutex<HashMap<String, Arc<MemContainer>>>,
    }

    impl KvPool for MemPool {
        fn open_container(&self, container: &str, create_if_missing: bool) -> Result<Arc<dyn KvContainer>> {
            let mut containers = self.containers.lock();
            if let Some(c) = containers.get(container) {
                return Ok(c.clone());
            }
            if !create_if_missing {
                return Err(read_failed(1, format!("container {container} does not exist")));
            }
            let c = Arc::new(MemContainer {
                known_classes: self.known_classes.clone(),
                state: Mutex::new(ContainerState::default()),
            });
            containers.insert(container.to_string(), c.clone());
            Ok(c)
        }
    }

    /// An in-process driver. `known_classes` seeds which object-class
    /// names are accepted; anything else is rejected as `UnknownObjectClass`.
    pub struct MemKvDriver {
        known_classes: HashSet<String>,
        pools: Mutex<HashMap<String, Arc<MemPool>>>,
    }

    impl MemKvDriver {
        pub fn new(known_classes: impl IntoIterator<Item = impl Into<String>>) -> Self {
            Self {
                known_classes: known_classes.into_iter().map(Into::into).collect(),
                pools: Mutex::new(HashMap::new()),
            }
        }
    }

    impl Default for MemKvDriver {
        fn default() -> Self {
            Self::new([crate::consts::META_CLASS, "DEFAULT"])
        }
    }

    impl KvDriver for MemKvDriver {
        fn open_pool(&self, pool: &str) -> Result<Arc<dyn KvPool>> {
            let mut pools = self.pools.lock();
            let p = pools
                .entry(pool.to_string())
                .or_insert_with(|| {
                    Arc::new(MemPool {
                        known_classes: self.known_classes.clone(),
                        containers: Mutex::new(HashMap::new()),
                    })
                })
                .clone();
            Ok(p)
        }
    }
}
