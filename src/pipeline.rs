// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Per-request write orchestration.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::allocator::SequenceAllocator;
use crate::config::DEFAULT_STORE_TIMEOUT;
use crate::error::{StoreError, StoreResult, WriteError};
use crate::metrics::MetricsTracker;
use crate::store::RecordStore;
use crate::types::{EventRecord, WriteReceipt};

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Counts a write as failed if its future is dropped mid-flight.
struct PendingWrite<'a> {
    pipeline: &'a WritePipeline,
    started: Instant,
    armed: bool,
}

impl Drop for PendingWrite<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.pipeline
            .metrics
            .on_write_outcome(elapsed_ms(self.started), false);
        ::metrics::increment_counter!("seqbench_writes_total", "outcome" => "cancelled");
        tracing::warn!(
            worker = %self.pipeline.worker_instance_id,
            "Write cancelled before completion"
        );
    }
}

/// Allocate, build, persist, account.
///
/// One pipeline per worker process. A failed persist leaves a gap at the
/// allocated id; the counter is never rolled back.
pub struct WritePipeline {
    allocator: SequenceAllocator,
    records: Arc<dyn RecordStore>,
    metrics: Arc<MetricsTracker>,
    worker_instance_id: String,
    store_timeout: Duration,
}

impl WritePipeline {
    pub fn new(
        allocator: SequenceAllocator,
        records: Arc<dyn RecordStore>,
        metrics: Arc<MetricsTracker>,
        worker_instance_id: impl Into<String>,
    ) -> Self {
        Self {
            allocator,
            records,
            metrics,
            worker_instance_id: worker_instance_id.into(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Bound applied to record store calls.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn worker_instance_id(&self) -> &str {
        &self.worker_instance_id
    }

    pub fn metrics(&self) -> &Arc<MetricsTracker> {
        &self.metrics
    }

    /// Run one write. Metrics are updated exactly once whatever the outcome,
    /// including when the returned future is dropped before completion.
    pub async fn handle_write(&self) -> Result<WriteReceipt, WriteError> {
        let started = Instant::now();
        let mut pending = PendingWrite {
            pipeline: self,
            started,
            armed: true,
        };
        let outcome = self.write(started).await;
        pending.armed = false;
        let duration_ms = elapsed_ms(started);

        match &outcome {
            Ok(receipt) => {
                self.metrics.on_write_outcome(receipt.process_duration_ms, true);
                ::metrics::increment_counter!("seqbench_writes_total", "outcome" => "ok");
                ::metrics::histogram!(
                    "seqbench_write_duration_seconds",
                    receipt.process_duration_ms / 1000.0
                );
            }
            Err(e) => {
                self.metrics.on_write_outcome(duration_ms, false);
                ::metrics::increment_counter!("seqbench_writes_total", "outcome" => e.stage());
                tracing::error!(
                    worker = %self.worker_instance_id,
                    stage = e.stage(),
                    "Write failed: {}",
                    e
                );
            }
        }

        outcome
    }

    async fn write(&self, started: Instant) -> Result<WriteReceipt, WriteError> {
        let sequence_id = self
            .allocator
            .allocate_next()
            .await
            .map_err(WriteError::Allocation)?;

        let record = EventRecord {
            sequence_id,
            timestamp: Utc::now(),
            process_duration_ms: elapsed_ms(started),
            worker_instance_id: self.worker_instance_id.clone(),
        };

        self.with_timeout(self.records.insert(&record))
            .await
            .map_err(|source| WriteError::Persistence {
                sequence_id,
                source,
            })?;

        tracing::trace!(%sequence_id, "Record persisted");

        Ok(WriteReceipt {
            sequence_id,
            process_duration_ms: elapsed_ms(started),
            worker_instance_id: self.worker_instance_id.clone(),
        })
    }

    /// Most recent `count` records, newest first.
    pub async fn recent_records(&self, count: usize) -> StoreResult<Vec<EventRecord>> {
        self.with_timeout(self.records.recent(count)).await
    }

    async fn with_timeout<T>(
        &self,
        fut: impl std::future::Future<Output = StoreResult<T>>,
    ) -> StoreResult<T> {
        tokio::time::timeout(self.store_timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout(self.store_timeout.as_millis() as u64))?
    }
}
