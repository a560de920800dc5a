//! Engine metrics
//!
//! - Counters only
//! - Monotonic increase
//! - Shared by every session of one search

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters for one search and all of its sessions
///
/// All counters use Relaxed atomics; values are exact once the
/// session workers are idle.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    sessions_started: AtomicU64,
    cursors_opened: AtomicU64,
    windows_fetched: AtomicU64,
    rows_fetched: AtomicU64,
    fetch_failures: AtomicU64,
    requests_enqueued: AtomicU64,
    requests_served: AtomicU64,
    requests_failed: AtomicU64,
    requests_discarded: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_sessions(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cursors(&self) {
        self.cursors_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one fetched window and its row count
    pub fn record_window(&self, rows: usize) {
        self.windows_fetched.fetch_add(1, Ordering::Relaxed);
        self.rows_fetched.fetch_add(rows as u64, Ordering::Relaxed);
    }

    pub fn increment_fetch_failures(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_enqueued(&self) {
        self.requests_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_served(&self) {
        self.requests_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_failed(&self, count: usize) {
        self.requests_failed.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn add_discarded(&self, count: usize) {
        self.requests_discarded.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Number of windows fetched so far
    pub fn windows_fetched(&self) -> u64 {
        self.windows_fetched.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            cursors_opened: self.cursors_opened.load(Ordering::Relaxed),
            windows_fetched: self.windows_fetched.load(Ordering::Relaxed),
            rows_fetched: self.rows_fetched.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            requests_enqueued: self.requests_enqueued.load(Ordering::Relaxed),
            requests_served: self.requests_served.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            requests_discarded: self.requests_discarded.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub sessions_started: u64,
    pub cursors_opened: u64,
    pub windows_fetched: u64,
    pub rows_fetched: u64,
    pub fetch_failures: u64,
    pub requests_enqueued: u64,
    pub requests_served: u64,
    pub requests_failed: u64,
    pub requests_discarded: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metrics_are_zero() {
        let metrics = EngineMetrics::new();
        let snapshot = metrics.snapshot();

        assert_eq!(snapshot.windows_fetched, 0);
        assert_eq!(snapshot.rows_fetched, 0);
        assert_eq!(snapshot.requests_served, 0);
    }

    #[test]
    fn test_record_window_counts_rows() {
        let metrics = EngineMetrics::new();
        metrics.record_window(1000);
        metrics.record_window(500);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.windows_fetched, 2);
        assert_eq!(snapshot.rows_fetched, 1500);
        assert_eq!(metrics.windows_fetched(), 2);
    }

    #[test]
    fn test_request_counters() {
        let metrics = EngineMetrics::new();
        metrics.increment_enqueued();
        metrics.increment_enqueued();
        metrics.increment_served();
        metrics.add_failed(2);
        metrics.add_discarded(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_enqueued, 2);
        assert_eq!(snapshot.requests_served, 1);
        assert_eq!(snapshot.requests_failed, 2);
        assert_eq!(snapshot.requests_discarded, 3);
    }

    #[test]
    fn test_snapshot_serializes() {
        let metrics = EngineMetrics::new();
        metrics.increment_sessions();
        let json = serde_json::to_value(metrics.snapshot()).unwrap();
        assert_eq!(json["sessions_started"], 1);
    }
}
