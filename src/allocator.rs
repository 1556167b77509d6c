// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Sequence allocation over the shared counter.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{COUNTER_KEY, DEFAULT_STORE_TIMEOUT};
use crate::error::{StoreError, StoreResult};
use crate::store::SequenceStore;
use crate::types::SequenceId;

/// Hands out globally unique ids by delegating to one atomic store increment.
///
/// Any number of allocators in any number of processes may share the same
/// counter. There is no local state: uniqueness comes entirely from the
/// store's indivisible find-and-increment.
#[derive(Clone)]
pub struct SequenceAllocator {
    store: Arc<dyn SequenceStore>,
    key: String,
    timeout: Duration,
}

impl SequenceAllocator {
    pub fn new(store: Arc<dyn SequenceStore>) -> Self {
        Self {
            store,
            key: COUNTER_KEY.to_string(),
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Next id. Never returns 0 and never falls back to a default: an
    /// empty or nonsensical store reply is an error.
    pub async fn allocate_next(&self) -> StoreResult<SequenceId> {
        let reply = tokio::time::timeout(self.timeout, self.store.increment(&self.key))
            .await
            .map_err(|_| StoreError::Timeout(self.timeout.as_millis() as u64))??;

        match reply {
            Some(0) => Err(StoreError::Malformed(format!(
                "counter `{}` reported 0 after increment",
                self.key
            ))),
            Some(value) => Ok(SequenceId(value)),
            None => Err(StoreError::MissingDocument(self.key.clone())),
        }
    }
}

impl std::fmt::Debug for SequenceAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceAllocator")
            .field("key", &self.key)
            .field("timeout", &self.timeout)
            .finish()
    }
}
