//! Optimizer counters
//!
//! Counters only, monotonic, relaxed atomics. A registry lives as long as
//! the optimizer context that owns it.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Registry of optimizer counters
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    optimizations_attempted: AtomicU64,
    executors_built: AtomicU64,
    no_plan_found: AtomicU64,
    unsupported_rejections: AtomicU64,
    indexes_modeled: AtomicU64,
    indexes_skipped: AtomicU64,
    sampling_selected: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_optimizations_attempted(&self) {
        self.optimizations_attempted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_executors_built(&self) {
        self.executors_built.fetch_add(1, Ordering::Relaxed);
    }

    /// Search returned zero candidate plans
    pub fn increment_no_plan_found(&self) {
        self.no_plan_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_unsupported_rejections(&self) {
        self.unsupported_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_indexes_modeled(&self, count: u64) {
        self.indexes_modeled.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_indexes_skipped(&self, count: u64) {
        self.indexes_skipped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_sampling_selected(&self) {
        self.sampling_selected.fetch_add(1, Ordering::Relaxed);
    }

    /// Current values as a JSON object string
    pub fn to_json(&self) -> String {
        // MetricsSnapshot only holds integers
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            optimizations_attempted: self.optimizations_attempted.load(Ordering::Relaxed),
            executors_built: self.executors_built.load(Ordering::Relaxed),
            no_plan_found: self.no_plan_found.load(Ordering::Relaxed),
            unsupported_rejections: self.unsupported_rejections.load(Ordering::Relaxed),
            indexes_modeled: self.indexes_modeled.load(Ordering::Relaxed),
            indexes_skipped: self.indexes_skipped.load(Ordering::Relaxed),
            sampling_selected: self.sampling_selected.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all counters
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    pub optimizations_attempted: u64,
    pub executors_built: u64,
    pub no_plan_found: u64,
    pub unsupported_rejections: u64,
    pub indexes_modeled: u64,
    pub indexes_skipped: u64,
    pub sampling_selected: u64,
}
