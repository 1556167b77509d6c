// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use seqbench::StoreError;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

impl IntoResponse for NodeError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.to_string()
        }));

        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

/// Failures that stop the process supervisor.
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("failed to launch worker for slot {slot}: {source}")]
    Spawn {
        slot: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("worker pool size must be at least 1")]
    NoWorkers,
}
