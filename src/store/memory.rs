// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{RecordStore, SequenceStore};
use crate::error::{StoreError, StoreResult};
use crate::types::EventRecord;

#[derive(Debug, Default)]
struct Faults {
    counter_unavailable: bool,
    missing_document: bool,
    failing_inserts: usize,
    latency: Option<Duration>,
}

/// In-process store with the same atomicity contract as the external one.
///
/// The counter increment happens under a single lock acquisition, so any
/// number of tasks (or allocators sharing one `Arc<MemoryStore>`) observe
/// distinct values. Fault switches let tests drive every failure path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    counters: Mutex<HashMap<String, u64>>,
    records: Mutex<Vec<EventRecord>>,
    faults: Mutex<Faults>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counter value without incrementing.
    pub fn counter(&self, key: &str) -> Option<u64> {
        self.counters.lock().get(key).copied()
    }

    /// All stored records in insertion order.
    pub fn records(&self) -> Vec<EventRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Make every counter increment fail as if the store were unreachable.
    pub fn set_counter_unavailable(&self, on: bool) {
        self.faults.lock().counter_unavailable = on;
    }

    /// Make increments succeed on the store side but return no document.
    pub fn set_missing_document(&self, on: bool) {
        self.faults.lock().missing_document = on;
    }

    /// Fail the next `n` inserts.
    pub fn fail_next_inserts(&self, n: usize) {
        self.faults.lock().failing_inserts = n;
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.faults.lock().latency = latency;
    }

    async fn delay(&self) {
        let latency = self.faults.lock().latency;
        if let Some(d) = latency {
            tokio::time::sleep(d).await;
        }
    }
}

#[async_trait]
impl SequenceStore for MemoryStore {
    async fn increment(&self, key: &str) -> StoreResult<Option<u64>> {
        self.delay().await;

        let (unavailable, missing) = {
            let faults = self.faults.lock();
            (faults.counter_unavailable, faults.missing_document)
        };
        if unavailable {
            return Err(StoreError::Unavailable("counter store offline".into()));
        }

        let value = {
            let mut counters = self.counters.lock();
            let slot = counters.entry(key.to_string()).or_insert(0);
            *slot += 1;
            *slot
        };

        if missing {
            return Ok(None);
        }
        Ok(Some(value))
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, record: &EventRecord) -> StoreResult<()> {
        self.delay().await;

        {
            let mut faults = self.faults.lock();
            if faults.failing_inserts > 0 {
                faults.failing_inserts -= 1;
                return Err(StoreError::Unavailable("record store rejected insert".into()));
            }
        }

        self.records.lock().push(record.clone());
        Ok(())
    }

    async fn recent(&self, limit: usize) -> StoreResult<Vec<EventRecord>> {
        self.delay().await;

        let mut out = self.records.lock().clone();
        out.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.sequence_id.cmp(&a.sequence_id))
        });
        out.truncate(limit);
        Ok(out)
    }
}
