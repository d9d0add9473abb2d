//! Per-instance metrics for the page-storage engine.
//!
//! Each `Sink`/`Source` owns its own [`Metrics`] handle (a cheap `Clone`
//! over a shared `Arc`) rather than touching process-wide state — two
//! datasets opened in the same process must not corrupt each other's
//! counts. Thread-safe atomic counters, matching the policy in §7:
//! `NRead`/`NReadV` bump on attempt (so a failed read is still visible),
//! everything else bumps only on success. Timers accumulate wall-clock
//! nanoseconds and are driven by a scope guard that adds its elapsed time
//! on drop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Default)]
struct Counters {
    // ----- I/O attempt/byte counters -----
    n_read: AtomicU64,
    n_read_v: AtomicU64,
    n_write: AtomicU64,
    n_write_v: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,

    // ----- Page pool -----
    page_pool_hits: AtomicU64,
    page_pool_misses: AtomicU64,
    page_pool_preloads: AtomicU64,

    // ----- Cluster pool / prefetch -----
    clusters_prefetched: AtomicU64,
    cluster_cache_hits: AtomicU64,
    cluster_cache_misses: AtomicU64,

    // ----- Timers (accumulated wall-clock nanoseconds) -----
    time_zip_nanos: AtomicU64,
    time_unzip_nanos: AtomicU64,
    time_write_nanos: AtomicU64,
    time_read_nanos: AtomicU64,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    pub n_read: u64,
    pub n_read_v: u64,
    pub n_write: u64,
    pub n_write_v: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub page_pool_hits: u64,
    pub page_pool_misses: u64,
    pub page_pool_preloads: u64,
    pub clusters_prefetched: u64,
    pub cluster_cache_hits: u64,
    pub cluster_cache_misses: u64,
    pub time_zip_nanos: u64,
    pub time_unzip_nanos: u64,
    pub time_write_nanos: u64,
    pub time_read_nanos: u64,
}

impl MetricsSnapshot {
    pub fn page_pool_hit_ratio(&self) -> f64 {
        let total = self.page_pool_hits + self.page_pool_misses;
        if total == 0 {
            0.0
        } else {
            self.page_pool_hits as f64 / total as f64
        }
    }
}

/// A `Sink`/`Source` instance's metrics handle. Cloning shares the same
/// underlying counters (so a page pool or cluster pool owned by the same
/// `Source` can record into it too) without reaching for global state.
#[derive(Clone, Default)]
pub struct Metrics(Arc<Counters>);

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            n_read: self.0.n_read.load(Ordering::Relaxed),
            n_read_v: self.0.n_read_v.load(Ordering::Relaxed),
            n_write: self.0.n_write.load(Ordering::Relaxed),
            n_write_v: self.0.n_write_v.load(Ordering::Relaxed),
            bytes_read: self.0.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.0.bytes_written.load(Ordering::Relaxed),
            page_pool_hits: self.0.page_pool_hits.load(Ordering::Relaxed),
            page_pool_misses: self.0.page_pool_misses.load(Ordering::Relaxed),
            page_pool_preloads: self.0.page_pool_preloads.load(Ordering::Relaxed),
            clusters_prefetched: self.0.clusters_prefetched.load(Ordering::Relaxed),
            cluster_cache_hits: self.0.cluster_cache_hits.load(Ordering::Relaxed),
            cluster_cache_misses: self.0.cluster_cache_misses.load(Ordering::Relaxed),
            time_zip_nanos: self.0.time_zip_nanos.load(Ordering::Relaxed),
            time_unzip_nanos: self.0.time_unzip_nanos.load(Ordering::Relaxed),
            time_write_nanos: self.0.time_write_nanos.load(Ordering::Relaxed),
            time_read_nanos: self.0.time_read_nanos.load(Ordering::Relaxed),
        }
    }

    // ----- Recorders -----

    pub fn record_read_attempt(&self) {
        self.0.n_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_read_v_attempt(&self) {
        self.0.n_read_v.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_success(&self, bytes: usize) {
        self.0.n_write.fetch_add(1, Ordering::Relaxed);
        self.0.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_write_v_success(&self, bytes: usize) {
        self.0.n_write_v.fetch_add(1, Ordering::Relaxed);
        self.0.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_read_success(&self, bytes: usize) {
        self.0.bytes_read.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_page_pool_hit(&self) {
        self.0.page_pool_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_page_pool_miss(&self) {
        self.0.page_pool_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_page_pool_preload(&self) {
        self.0.page_pool_preloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_clusters_prefetched(&self, n: u64) {
        self.0.clusters_prefetched.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_cluster_cache_hit(&self) {
        self.0.cluster_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cluster_cache_miss(&self) {
        self.0.cluster_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Starts a scope-guard timer that accumulates into this handle's
    /// matching counter when it drops.
    pub fn timer(&self, kind: TimerKind) -> ScopedTimer {
        ScopedTimer {
            metrics: self.clone(),
            kind,
            start: Instant::now(),
        }
    }
}

/// Named timers recognized by [`ScopedTimer`], matching the `TimeZip` /
/// `TimeWrite` labels used in §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Zip,
    Unzip,
    Write,
    Read,
}

/// Accumulates wall-clock time into the owning [`Metrics`] handle's
/// matching counter on drop, regardless of which exit path (including an
/// early `?`) leaves the scope.
pub struct ScopedTimer {
    metrics: Metrics,
    kind: TimerKind,
    start: Instant,
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed().as_nanos() as u64;
        let counter = match self.kind {
            TimerKind::Zip => &self.metrics.0.time_zip_nanos,
            TimerKind::Unzip => &self.metrics.0.time_unzip_nanos,
            TimerKind::Write => &self.metrics.0.time_write_nanos,
            TimerKind::Read => &self.metrics.0.time_read_nanos,
        };
        counter.fetch_add(elapsed, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_timer_accumulates_on_drop() {
        let metrics = Metrics::new();
        let before = metrics.snapshot().time_write_nanos;
        {
            let _t = metrics.timer(TimerKind::Write);
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        let after = metrics.snapshot().time_write_nanos;
        assert!(after > before);
    }

    #[test]
    fn write_success_updates_bytes_and_count() {
        let metrics = Metrics::new();
        metrics.record_write_success(128);
        let snap = metrics.snapshot();
        assert_eq!(snap.n_write, 1);
        assert_eq!(snap.bytes_written, 128);
    }

    #[test]
    fn two_handles_do_not_share_counters() {
        let a = Metrics::new();
        let b = Metrics::new();
        a.record_write_success(64);
        assert_eq!(a.snapshot().n_write, 1);
        assert_eq!(b.snapshot().n_write, 0);
    }

    #[test]
    fn cloned_handle_shares_the_same_counters() {
        let a = Metrics::new();
        let b = a.clone();
        a.record_read_attempt();
        assert_eq!(b.snapshot().n_read, 1);
    }
}
