// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.

//! seqbench: globally unique sequence allocation and a per-worker write pipeline.

pub mod config;
pub mod error;
pub mod types;
pub mod store;
pub mod allocator;
pub mod metrics;
pub mod pipeline;

pub use allocator::SequenceAllocator;
pub use error::{StoreError, StoreResult, WriteError};
pub use crate::metrics::{InFlightGuard, MetricsTracker, WorkerMetrics};
pub use pipeline::WritePipeline;
pub use types::{EventRecord, SequenceId, WriteReceipt};

#[cfg(test)]
pub mod tests;
