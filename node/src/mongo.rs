// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! MongoDB-backed counter and record collections.
//!
//! Layout:
//! - `counters`: `{ _id: "sequenceId", value: <int64> }`
//! - `requests`: `{ sequenceId, timestamp, processDurationMs, workerInstanceId }`
//!
//! The increment is a single `findOneAndUpdate` with `$inc`, `upsert` and
//! `returnDocument: after`. MongoDB applies it atomically per document, which
//! is what makes allocation safe across every worker process.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::TryStreamExt;
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::options::{ClientOptions, FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::{Client, Collection, Database, IndexModel};

use seqbench::store::{RecordStore, SequenceStore};
use seqbench::{EventRecord, SequenceId, StoreError, StoreResult};

use crate::config::NodeConfig;

pub const COUNTERS_COLLECTION: &str = "counters";
pub const RECORDS_COLLECTION: &str = "requests";
/// Used when the connection string names no database.
pub const DEFAULT_DATABASE: &str = "seqbench";

fn unavailable(e: mongodb::error::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

#[derive(Clone, Debug)]
pub struct MongoStore {
    counters: Collection<Document>,
    records: Collection<Document>,
}

impl MongoStore {
    pub async fn connect(cfg: &NodeConfig) -> StoreResult<Self> {
        let mut options = ClientOptions::parse(&cfg.store_uri).await.map_err(unavailable)?;
        options.max_pool_size = Some(cfg.max_pool_size);
        options.server_selection_timeout = Some(cfg.store_timeout);
        options.app_name = Some("seqbench".to_string());

        let client = Client::with_options(options).map_err(unavailable)?;
        let db = client
            .default_database()
            .unwrap_or_else(|| client.database(DEFAULT_DATABASE));

        tracing::info!(database = %db.name(), "Connected to MongoDB");
        Ok(Self::from_database(&db))
    }

    pub fn from_database(db: &Database) -> Self {
        Self {
            counters: db.collection(COUNTERS_COLLECTION),
            records: db.collection(RECORDS_COLLECTION),
        }
    }

    /// Index backing the recency query.
    pub async fn ensure_indexes(&self) -> StoreResult<()> {
        let model = IndexModel::builder()
            .keys(doc! { "timestamp": -1, "sequenceId": -1 })
            .build();
        self.records.create_index(model, None).await.map_err(unavailable)?;
        Ok(())
    }
}

#[async_trait]
impl SequenceStore for MongoStore {
    async fn increment(&self, key: &str) -> StoreResult<Option<u64>> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        let updated = self
            .counters
            .find_one_and_update(doc! { "_id": key }, doc! { "$inc": { "value": 1_i64 } }, options)
            .await
            .map_err(unavailable)?;

        updated.map(|d| counter_value(&d)).transpose()
    }
}

#[async_trait]
impl RecordStore for MongoStore {
    async fn insert(&self, record: &EventRecord) -> StoreResult<()> {
        let document = record_to_document(record)?;
        self.records.insert_one(document, None).await.map_err(unavailable)?;
        Ok(())
    }

    async fn recent(&self, limit: usize) -> StoreResult<Vec<EventRecord>> {
        let Some(options) = recent_options(limit) else {
            return Ok(Vec::new());
        };

        let cursor = self.records.find(None, options).await.map_err(unavailable)?;
        let docs: Vec<Document> = cursor.try_collect().await.map_err(unavailable)?;
        docs.iter().map(document_to_record).collect()
    }
}

/// MongoDB reads a limit of 0 as "no limit", so an empty request never
/// reaches the server.
fn recent_options(limit: usize) -> Option<FindOptions> {
    if limit == 0 {
        return None;
    }
    Some(
        FindOptions::builder()
            .sort(doc! { "timestamp": -1, "sequenceId": -1 })
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .build(),
    )
}

fn counter_value(d: &Document) -> StoreResult<u64> {
    match d.get("value") {
        Some(Bson::Int64(v)) if *v > 0 => Ok(*v as u64),
        Some(Bson::Int32(v)) if *v > 0 => Ok(*v as u64),
        other => Err(StoreError::Malformed(format!("counter value {:?}", other))),
    }
}

pub fn record_to_document(record: &EventRecord) -> StoreResult<Document> {
    let sequence_id = i64::try_from(record.sequence_id.0)
        .map_err(|_| StoreError::Malformed(format!("sequence id {} exceeds int64", record.sequence_id)))?;

    Ok(doc! {
        "sequenceId": sequence_id,
        "timestamp": bson::DateTime::from_millis(record.timestamp.timestamp_millis()),
        "processDurationMs": record.process_duration_ms,
        "workerInstanceId": record.worker_instance_id.as_str(),
    })
}

pub fn document_to_record(d: &Document) -> StoreResult<EventRecord> {
    let malformed = |field: &str| StoreError::Malformed(format!("record field `{}`", field));

    let sequence_id = match d.get("sequenceId") {
        Some(Bson::Int64(v)) if *v > 0 => *v as u64,
        Some(Bson::Int32(v)) if *v > 0 => *v as u64,
        _ => return Err(malformed("sequenceId")),
    };

    let millis = d
        .get_datetime("timestamp")
        .map_err(|_| malformed("timestamp"))?
        .timestamp_millis();
    let timestamp = Utc
        .timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| malformed("timestamp"))?;

    let process_duration_ms = match d.get("processDurationMs") {
        Some(Bson::Double(v)) => *v,
        Some(Bson::Int32(v)) => f64::from(*v),
        Some(Bson::Int64(v)) => *v as f64,
        _ => return Err(malformed("processDurationMs")),
    };

    let worker_instance_id = d
        .get_str("workerInstanceId")
        .map_err(|_| malformed("workerInstanceId"))?
        .to_string();

    Ok(EventRecord {
        sequence_id: SequenceId(sequence_id),
        timestamp,
        process_duration_ms,
        worker_instance_id,
    })
}
