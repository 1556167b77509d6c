// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::Arc;

use crate::metrics::{MetricsTracker, WorkerMetrics};

#[test]
fn test_fresh_tracker_is_zeroed() {
    let tracker = MetricsTracker::new();
    assert_eq!(tracker.snapshot(), WorkerMetrics::default());
}

#[test]
fn test_running_mean_matches_arithmetic_mean() {
    let tracker = MetricsTracker::new();
    let durations = [12.0, 3.5, 40.25, 7.0, 0.75, 19.0];

    for (i, d) in durations.iter().enumerate() {
        tracker.on_write_outcome(*d, true);
        // Failures interleaved must not move the mean.
        if i % 2 == 0 {
            tracker.on_write_outcome(10_000.0, false);
        }
    }

    let snap = tracker.snapshot();
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;
    assert_eq!(snap.total_requests, durations.len() as u64);
    assert_eq!(snap.failed_requests, 3);
    assert!((snap.avg_processing_time_ms - mean).abs() < 1e-9);
    assert_eq!(snap.max_processing_time_ms, 40.25);
}

#[test]
fn test_failures_only_count() {
    let tracker = MetricsTracker::new();
    tracker.on_write_outcome(99.0, false);
    tracker.on_write_outcome(5.0, false);

    let snap = tracker.snapshot();
    assert_eq!(snap.failed_requests, 2);
    assert_eq!(snap.total_requests, 0);
    assert_eq!(snap.avg_processing_time_ms, 0.0);
    assert_eq!(snap.max_processing_time_ms, 0.0);
}

#[test]
fn test_in_flight_guard_balances() {
    let tracker = Arc::new(MetricsTracker::new());

    let a = tracker.track_request();
    let b = tracker.track_request();
    assert_eq!(tracker.snapshot().concurrent_requests, 2);

    drop(a);
    assert_eq!(tracker.snapshot().concurrent_requests, 1);
    drop(b);
    assert_eq!(tracker.snapshot().concurrent_requests, 0);
}

#[test]
fn test_finish_without_start_saturates() {
    let tracker = MetricsTracker::new();
    tracker.on_request_finish();
    assert_eq!(tracker.snapshot().concurrent_requests, 0);
}

#[test]
fn test_snapshot_serializes_camel_case() {
    let tracker = MetricsTracker::new();
    tracker.on_write_outcome(4.0, true);
    let json = serde_json::to_value(tracker.snapshot()).unwrap();

    assert_eq!(json["totalRequests"], 1);
    assert_eq!(json["failedRequests"], 0);
    assert_eq!(json["avgProcessingTimeMs"], 4.0);
    assert_eq!(json["maxProcessingTimeMs"], 4.0);
    assert_eq!(json["concurrentRequests"], 0);
}
