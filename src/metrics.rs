//! Dispatch metrics for the keyboard pipeline.
//!
//! Lock-free counters shared between the arbitrator and the orchestrator.
//! Cloning a [`PipelineMetrics`] shares the same counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Aggregated counters for one page load.
#[derive(Clone, Debug, Default)]
pub struct PipelineMetrics {
    dispatched: Arc<AtomicU64>,
    suppressed: Arc<AtomicU64>,
    ignored: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
    total_dispatch_time_us: Arc<AtomicU64>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an action handed to the executor and the synchronous time it took.
    pub fn record_dispatch(&self, elapsed_us: u64) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        self.total_dispatch_time_us.fetch_add(elapsed_us, Ordering::Relaxed);
    }

    /// Records a key event whose native handling was suppressed.
    pub fn record_suppressed(&self) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ignored(&self) {
        self.ignored.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an action that ended up not applied, immediately or after resolving.
    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    pub fn suppressed(&self) -> u64 {
        self.suppressed.load(Ordering::Relaxed)
    }

    pub fn ignored(&self) -> u64 {
        self.ignored.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Average synchronous dispatch time in microseconds.
    pub fn avg_dispatch_time_us(&self) -> f32 {
        let total = self.dispatched();
        if total == 0 {
            return 0.0;
        }
        self.total_dispatch_time_us.load(Ordering::Relaxed) as f32 / total as f32
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            dispatched: self.dispatched(),
            suppressed: self.suppressed(),
            ignored: self.ignored(),
            failed: self.failed(),
            avg_dispatch_time_us: self.avg_dispatch_time_us(),
        }
    }
}

/// Point-in-time copy of [`PipelineMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub dispatched: u64,
    pub suppressed: u64,
    pub ignored: u64,
    pub failed: u64,
    pub avg_dispatch_time_us: f32,
}
