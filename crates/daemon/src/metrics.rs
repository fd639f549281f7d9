//! Lightweight in-process counters surfaced at `GET /metrics`.
//!
//! Adapted from the teacher's `metrics.rs` (one gauge/counter per pipeline
//! stage, snapshot-able for the metrics endpoint); the exporter swapped from
//! `prometheus`/`metrics` to plain atomics and `tracing` events, since
//! cross-seed has no external metrics backend to push to (see DESIGN.md's
//! dependency-drop note).

use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use tracing::debug;

#[derive(Debug, Default)]
pub struct DaemonMetrics {
    searches_completed: AtomicU64,
    candidates_evaluated: AtomicU64,
    matches_dispatched: AtomicU64,
    indexer_failures: AtomicU64,
    queue_depth: AtomicI64,
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub searches_completed: u64,
    pub candidates_evaluated: u64,
    pub matches_dispatched: u64,
    pub indexer_failures: u64,
    pub queue_depth: i64,
}

impl DaemonMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_search_completed(&self) {
        self.searches_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_candidate_evaluated(&self) {
        self.candidates_evaluated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_match_dispatched(&self) {
        self.matches_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_indexer_failure(&self, indexer: &str) {
        self.indexer_failures.fetch_add(1, Ordering::Relaxed);
        debug!(indexer, "indexer failure recorded");
    }

    pub fn set_queue_depth(&self, depth: i64) {
        self.queue_depth.store(depth, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            searches_completed: self.searches_completed.load(Ordering::Relaxed),
            candidates_evaluated: self.candidates_evaluated.load(Ordering::Relaxed),
            matches_dispatched: self.matches_dispatched.load(Ordering::Relaxed),
            indexer_failures: self.indexer_failures.load(Ordering::Relaxed),
            queue_depth: self.queue_depth.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let metrics = DaemonMetrics::new();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.searches_completed, 0);
        assert_eq!(snapshot.queue_depth, 0);
    }

    #[test]
    fn record_methods_increment_counters() {
        let metrics = DaemonMetrics::new();
        metrics.record_search_completed();
        metrics.record_candidate_evaluated();
        metrics.record_indexer_failure("demo");
        metrics.set_queue_depth(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.searches_completed, 1);
        assert_eq!(snapshot.candidates_evaluated, 1);
        assert_eq!(snapshot.indexer_failures, 1);
        assert_eq!(snapshot.queue_depth, 3);
    }
}
