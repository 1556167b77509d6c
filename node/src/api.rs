// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use serde::{Deserialize, Serialize};
use seqbench::{SequenceId, WorkerMetrics, WriteReceipt};

use crate::telemetry::MemoryUsage;

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WriteSuccessResponse {
    pub success: bool,
    pub sequence_id: SequenceId,
    pub process_duration_ms: f64,
    pub worker_instance_id: String,
}

impl From<WriteReceipt> for WriteSuccessResponse {
    fn from(r: WriteReceipt) -> Self {
        Self {
            success: true,
            sequence_id: r.sequence_id,
            process_duration_ms: r.process_duration_ms,
            worker_instance_id: r.worker_instance_id,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WriteFailureResponse {
    pub success: bool,
    pub error: String,
    pub worker_instance_id: String,
}

/// This worker's own counters; never aggregated across the pool.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResponse {
    #[serde(flatten)]
    pub metrics: WorkerMetrics,
    pub worker_id: u32,
    pub memory_usage: Option<MemoryUsage>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub worker_id: u32,
}
