//! Cluster residency tracking for the source's sequential-read path (§4.6).
//!
//! `loadClusters` prefetches whole clusters ahead of `populatePage`; this
//! pool tracks which cluster ids are currently resident (their pages are in
//! the page pool) so a prefetch of an already-resident cluster is a no-op
//! and so eviction has somewhere to look when capacity is exceeded. The
//! actual page bytes live in [`crate::page_pool::PagePool`] — this pool only
//! tracks cluster-level residency and pinning, a separation kept distinct
//! from the page cache itself so eviction policy can change without
//! touching page ownership.
//!
//! A cluster is pinned while it is `fCurrentCluster` (§4.6): pinned
//! clusters are never chosen for eviction, mirroring the one-cluster-at-a-
//! time access pattern `populatePage` drives.

use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;

use crate::metrics::Metrics;

struct State {
    /// Most-recently-used at the back; eviction pops from the front.
    order: VecDeque<u64>,
    resident: HashSet<u64>,
    pinned: HashSet<u64>,
}

pub struct ClusterPool {
    capacity: usize,
    state: Mutex<State>,
    metrics: Metrics,
}

impl ClusterPool {
    pub fn new(capacity: usize, metrics: Metrics) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(State {
                order: VecDeque::new(),
                resident: HashSet::new(),
                pinned: HashSet::new(),
            }),
            metrics,
        }
    }

    pub fn is_resident(&self, cluster_id: u64) -> bool {
        self.state.lock().resident.contains(&cluster_id)
    }

    /// Marks `cluster_id` resident (recording a hit or a prefetch-miss) and
    /// evicts the least-recently-used unpinned cluster if over capacity.
    pub fn touch(&self, cluster_id: u64) {
        let mut st = self.state.lock();
        if st.resident.contains(&cluster_id) {
            self.metrics.record_cluster_cache_hit();
            st.order.retain(|id| *id != cluster_id);
            st.order.push_back(cluster_id);
            return;
        }
        self.metrics.record_cluster_cache_miss();
        st.resident.insert(cluster_id);
        st.order.push_back(cluster_id);

        while st.resident.len() > self.capacity {
            let victim = st
                .order
                .iter()
                .position(|id| !st.pinned.contains(id))
                .map(|idx| st.order.remove(idx).unwrap());
            match victim {
                Some(id) => {
                    st.resident.remove(&id);
                }
                None => break, // everything resident is pinned; over capacity is unavoidable
            }
        }
    }

    /// Registers `n` clusters as freshly prefetched in one `loadClusters`
    /// batch, for the `clustersPrefetched` counter (§7).
    pub fn record_prefetch_batch(&self, n: u64) {
        self.metrics.record_clusters_prefetched(n);
    }

    pub fn pin(&self, cluster_id: u64) {
        self.touch(cluster_id);
        self.state.lock().pinned.insert(cluster_id);
    }

    pub fn unpin(&self, cluster_id: u64) {
        self.state.lock().pinned.remove(&cluster_id);
    }

    pub fn resident_count(&self) -> usize {
        self.state.lock().resident.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_marks_resident_and_repeats_are_hits() {
        let pool = ClusterPool::new(4, Metrics::new());
        pool.touch(1);
        assert!(pool.is_resident(1));
        pool.touch(1);
        assert_eq!(pool.resident_count(), 1);
    }

    #[test]
    fn evicts_lru_unpinned_past_capacity() {
        let pool = ClusterPool::new(2, Metrics::new());
        pool.touch(1);
        pool.touch(2);
        pool.touch(3);
        assert_eq!(pool.resident_count(), 2);
        assert!(!pool.is_resident(1));
        assert!(pool.is_resident(3));
    }

    #[test]
    fn pinned_cluster_survives_eviction_pressure() {
        let pool = ClusterPool::new(1, Metrics::new());
        pool.pin(1);
        pool.touch(2);
        pool.touch(3);
        assert!(pool.is_resident(1));
        pool.unpin(1);
        pool.touch(4);
        assert!(!pool.is_resident(1));
    }
}
