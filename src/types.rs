// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Globally unique, strictly increasing identifier handed out by the shared counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceId(pub u64);

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One persisted write. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub sequence_id: SequenceId,
    pub timestamp: DateTime<Utc>,
    /// Elapsed pipeline time when the record was built, in milliseconds.
    pub process_duration_ms: f64,
    pub worker_instance_id: String,
}

/// Successful outcome of the write pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteReceipt {
    pub sequence_id: SequenceId,
    /// Entry-to-persisted wall clock time, in milliseconds.
    pub process_duration_ms: f64,
    pub worker_instance_id: String,
}
