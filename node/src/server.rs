// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use axum::{
    extract::{Path, Request as AxumRequest, State},
    http::StatusCode,
    middleware::{from_fn_with_state, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use seqbench::config::{DEFAULT_RECENT_COUNT, MAX_RECENT_COUNT};
use seqbench::{EventRecord, WritePipeline};

use crate::api::*;
use crate::errors::NodeError;

/// Everything a worker's handlers need.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<WritePipeline>,
    pub worker_id: u32,
}

impl AppState {
    pub fn new(pipeline: WritePipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            worker_id: std::process::id(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/test-write", post(test_write))
        .route("/metrics", get(metrics_snapshot))
        .route("/metrics/prometheus", get(prometheus_handler))
        .route("/last-requests", get(last_requests_default))
        .route("/last-requests/:count", get(last_requests))
        .route("/health", get(health))
        .layer(from_fn_with_state(state.clone(), track_in_flight))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Counts every request, not only writes, as in flight until its response is produced.
async fn track_in_flight(State(state): State<AppState>, req: AxumRequest, next: Next) -> Response {
    let _guard = state.pipeline.metrics().track_request();
    next.run(req).await
}

async fn test_write(State(state): State<AppState>) -> Response {
    match state.pipeline.handle_write().await {
        Ok(receipt) => Json(WriteSuccessResponse::from(receipt)).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(WriteFailureResponse {
                success: false,
                error: e.to_string(),
                worker_instance_id: state.pipeline.worker_instance_id().to_string(),
            }),
        )
            .into_response(),
    }
}

async fn metrics_snapshot(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        metrics: state.pipeline.metrics().snapshot(),
        worker_id: state.worker_id,
        memory_usage: crate::telemetry::memory_usage(),
    })
}

async fn prometheus_handler() -> String {
    crate::telemetry::render_metrics()
}

async fn last_requests_default(
    State(state): State<AppState>,
) -> Result<Json<Vec<EventRecord>>, NodeError> {
    recent(&state, DEFAULT_RECENT_COUNT).await
}

async fn last_requests(
    State(state): State<AppState>,
    Path(count): Path<String>,
) -> Result<Json<Vec<EventRecord>>, NodeError> {
    recent(&state, parse_count(&count)).await
}

async fn recent(state: &AppState, count: usize) -> Result<Json<Vec<EventRecord>>, NodeError> {
    let records = state.pipeline.recent_records(count).await?;
    Ok(Json(records))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        worker_id: state.worker_id,
    })
}

/// Anything that is not a positive integer falls back to the default.
pub fn parse_count(raw: &str) -> usize {
    match raw.trim().parse::<i64>() {
        Ok(n) if n > 0 => (n as u64).min(MAX_RECENT_COUNT as u64) as usize,
        _ => DEFAULT_RECENT_COUNT,
    }
}
