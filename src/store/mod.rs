// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Interfaces to the external store.
//!
//! Both traits are the boundary to whatever service actually holds the shared
//! counter and the record collection. All cross-process correctness rests on
//! [`SequenceStore::increment`] being a single indivisible read-modify-write
//! on the store side; nothing here locks or retries.
//!
//! - `MemoryStore` backs tests and single-process runs.
//! - The MongoDB adapter lives in `seqbench-node`.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::EventRecord;

pub mod memory;

pub use memory::MemoryStore;

/// Atomic counter service.
#[async_trait]
pub trait SequenceStore: Send + Sync {
    /// Find the counter at `key`, add one, and return the value after the
    /// increment, creating the counter (so the first call yields 1) if it
    /// does not exist.
    ///
    /// `Ok(None)` means the store acknowledged the operation but returned no
    /// document.
    async fn increment(&self, key: &str) -> StoreResult<Option<u64>>;
}

/// Append-only record collection.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert(&self, record: &EventRecord) -> StoreResult<()>;

    /// Up to `limit` records, newest timestamp first. Ties are broken by
    /// sequence id, highest first.
    async fn recent(&self, limit: usize) -> StoreResult<Vec<EventRecord>>;
}
