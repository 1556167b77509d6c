// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::errors::NodeError;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

const DEFAULT_FILTER: &str = "seqbench=info,seqbench_node=info,tower_http=info";

/// Initialize logging. Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Install this worker's Prometheus recorder.
pub fn init_metrics() -> Result<(), NodeError> {
    if PROM_HANDLE.get().is_some() {
        tracing::warn!("Prometheus handle already set. Telemetry re-initialized?");
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| NodeError::Telemetry(e.to_string()))?;
    let _ = PROM_HANDLE.set(handle);

    metrics::describe_counter!("seqbench_writes_total", "Write requests by outcome");
    metrics::describe_histogram!(
        "seqbench_write_duration_seconds",
        "Entry-to-persisted time of successful writes"
    );
    metrics::describe_gauge!("seqbench_concurrent_requests", "Requests currently in flight");

    metrics::gauge!("seqbench_worker_up", 1.0);
    Ok(())
}

/// Render the Prometheus exposition for `/metrics/prometheus`.
pub fn render_metrics() -> String {
    if let Some(handle) = PROM_HANDLE.get() {
        handle.render()
    } else {
        "# metrics not initialized".to_string()
    }
}

/// Resident and virtual memory of this process.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub rss_bytes: u64,
    pub virtual_bytes: u64,
}

/// Reads `/proc/self/status`. `None` where procfs is unavailable.
pub fn memory_usage() -> Option<MemoryUsage> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_status(&status)
}

/// Picks `VmRSS` and `VmSize` out of a status file. Both are in kB, which
/// keeps the result independent of the page size.
fn parse_status(status: &str) -> Option<MemoryUsage> {
    let mut rss_kb = None;
    let mut virtual_kb = None;

    for line in status.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let slot = match key {
            "VmRSS" => &mut rss_kb,
            "VmSize" => &mut virtual_kb,
            _ => continue,
        };
        let mut parts = value.split_whitespace();
        let amount: u64 = parts.next()?.parse().ok()?;
        if parts.next() != Some("kB") {
            return None;
        }
        *slot = Some(amount);
    }

    Some(MemoryUsage {
        rss_bytes: rss_kb? * 1024,
        virtual_bytes: virtual_kb? * 1024,
    })
}
