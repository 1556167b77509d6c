// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod config;
pub mod errors;
pub mod api;
pub mod server;
pub mod mongo;
pub mod telemetry;
pub mod supervisor;
pub mod worker;

use tokio_util::sync::CancellationToken;

/// Token cancelled on ctrl-c or SIGTERM. Must be called inside a runtime.
pub fn shutdown_signal() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            res = tokio::signal::ctrl_c() => match res {
                Ok(()) => tracing::info!("Interrupt received"),
                Err(e) => tracing::error!("Failed to listen for ctrl-c: {}", e),
            },
            _ = terminated() => tracing::info!("Terminate received"),
        }
        trigger.cancel();
    });
    token
}

#[cfg(unix)]
async fn terminated() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            term.recv().await;
        }
        Err(e) => {
            tracing::error!("Failed to listen for SIGTERM: {}", e);
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn terminated() {
    std::future::pending::<()>().await
}
