// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Per-worker request counters.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Point-in-time view of one worker's counters.
///
/// `total_requests` counts successful writes and is the `n` of the running
/// mean. Failures only move `failed_requests`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerMetrics {
    pub total_requests: u64,
    pub failed_requests: u64,
    pub avg_processing_time_ms: f64,
    pub max_processing_time_ms: f64,
    pub concurrent_requests: u64,
}

/// Owner of a worker's [`WorkerMetrics`].
///
/// Each worker process holds exactly one tracker; nothing is shared across
/// processes. The mutex is only there to satisfy `Sync` for handler state and
/// is never contended on a single-threaded runtime.
#[derive(Debug, Default)]
pub struct MetricsTracker {
    inner: Mutex<WorkerMetrics>,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_request_start(&self) {
        let mut m = self.inner.lock();
        m.concurrent_requests += 1;
        ::metrics::gauge!("seqbench_concurrent_requests", m.concurrent_requests as f64);
    }

    pub fn on_request_finish(&self) {
        let mut m = self.inner.lock();
        m.concurrent_requests = m.concurrent_requests.saturating_sub(1);
        ::metrics::gauge!("seqbench_concurrent_requests", m.concurrent_requests as f64);
    }

    /// Record the outcome of one pipeline run.
    pub fn on_write_outcome(&self, duration_ms: f64, success: bool) {
        let mut m = self.inner.lock();
        if !success {
            m.failed_requests += 1;
            return;
        }

        m.total_requests += 1;
        let n = m.total_requests as f64;
        m.avg_processing_time_ms = (m.avg_processing_time_ms * (n - 1.0) + duration_ms) / n;
        if duration_ms > m.max_processing_time_ms {
            m.max_processing_time_ms = duration_ms;
        }
    }

    pub fn snapshot(&self) -> WorkerMetrics {
        *self.inner.lock()
    }

    /// Count a request as in flight until the returned guard is dropped.
    pub fn track_request(self: &Arc<Self>) -> InFlightGuard {
        self.on_request_start();
        InFlightGuard {
            tracker: Arc::clone(self),
        }
    }
}

/// Decrements `concurrent_requests` on drop, including when the request
/// future is cancelled.
#[derive(Debug)]
pub struct InFlightGuard {
    tracker: Arc<MetricsTracker>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.tracker.on_request_finish();
    }
}
