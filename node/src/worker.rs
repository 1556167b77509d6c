// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! One worker process: store connection, pipeline, HTTP listener.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpSocket};
use tokio_util::sync::CancellationToken;

use seqbench::store::{RecordStore, SequenceStore};
use seqbench::{MetricsTracker, SequenceAllocator, WritePipeline};

use crate::config::NodeConfig;
use crate::errors::NodeError;
use crate::mongo::MongoStore;
use crate::server::{build_router, AppState};

/// Assemble a worker's pipeline over the given stores.
pub fn build_pipeline(
    sequences: Arc<dyn SequenceStore>,
    records: Arc<dyn RecordStore>,
    cfg: &NodeConfig,
    worker_instance_id: impl Into<String>,
) -> WritePipeline {
    let allocator = SequenceAllocator::new(sequences).with_timeout(cfg.store_timeout);
    WritePipeline::new(allocator, records, Arc::new(MetricsTracker::new()), worker_instance_id)
        .with_store_timeout(cfg.store_timeout)
}

/// Bind `addr` with `SO_REUSEPORT` so every worker can listen on the same port.
pub fn bind_shared(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    #[cfg(unix)]
    socket.set_reuseport(true)?;
    socket.bind(addr)?;
    socket.listen(1024)
}

/// Serve until `shutdown` is cancelled.
pub async fn run_worker(cfg: NodeConfig, shutdown: CancellationToken) -> Result<(), NodeError> {
    crate::telemetry::init_metrics()?;

    let pid = std::process::id();
    let slot = std::env::var(crate::config::ENV_WORKER_SLOT).ok();

    let store = Arc::new(MongoStore::connect(&cfg).await?);
    if let Err(e) = store.ensure_indexes().await {
        tracing::warn!("Could not create record index: {}", e);
    }

    let pipeline = build_pipeline(store.clone(), store, &cfg, pid.to_string());
    let app = build_router(AppState::new(pipeline));

    let listener = bind_shared(cfg.bind_addr)?;
    tracing::info!(?slot, "Worker {} started on {}", pid, cfg.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("Worker {} stopped", pid);
    Ok(())
}
