// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Error types.

use thiserror::Error;

use crate::types::SequenceId;

/// Failures of the external counter / record store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Store could not be reached or rejected the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The call did not complete within the configured bound.
    #[error("store call timed out after {0}ms")]
    Timeout(u64),
    /// The atomic increment came back without a document.
    #[error("store returned no document for counter `{0}`")]
    MissingDocument(String),
    /// A document was returned but could not be interpreted.
    #[error("malformed document: {0}")]
    Malformed(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Why a write request did not produce a persisted record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WriteError {
    #[error("sequence allocation failed: {0}")]
    Allocation(#[source] StoreError),
    /// The id was consumed; the sequence keeps a gap at `sequence_id`.
    #[error("persisting record {sequence_id} failed: {source}")]
    Persistence {
        sequence_id: SequenceId,
        #[source]
        source: StoreError,
    },
}

impl WriteError {
    /// Stage label used for logs and exported counters.
    pub fn stage(&self) -> &'static str {
        match self {
            WriteError::Allocation(_) => "allocation_failed",
            WriteError::Persistence { .. } => "persistence_failed",
        }
    }
}
