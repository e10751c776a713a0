//! talkroom HTTP server binary.
//!
//! Starts an axum HTTP server in front of one shared message broker.
//!
//! # Environment Variables
//!
//! - `TALKROOM_HOST` — bind host (default: 0.0.0.0)
//! - `TALKROOM_PORT` / `PORT` — HTTP port (default: 8890)
//! - `TALKROOM_MAX_FRAGMENT` — per-append character limit (default: 200)
//! - `TALKROOM_KEEPALIVE_MS` — delivery stream keepalive (default: 1000)
//! - `TALKROOM_ENFORCE_STICK` — reject chat from non-holders of the stick
//! - `RUST_LOG` — Tracing filter (default: "info,talkroom=debug")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin server
//! ```

use std::sync::Arc;

use anyhow::Context;
use talkroom::broker::{spawn_reminder_sweep, MessageBroker};
use talkroom::config::ServerConfig;
use talkroom::server::{app_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,talkroom=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env();
    let bind_addr = config.bind_addr();

    let broker = MessageBroker::shared(config.chat.clone());
    let sweep = spawn_reminder_sweep(Arc::clone(&broker));
    let app = app_router(AppState::new(Arc::clone(&broker)));

    tracing::info!("talkroom server starting on {}", bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health  — liveness check");
    tracing::info!("  POST /send    — broadcast a message");
    tracing::info!("  GET  /events  — per-participant delivery stream");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    let stopping = Arc::clone(&broker);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!("Shutdown requested");
            stopping.shutdown();
        })
        .await
        .context("server failed")?;

    sweep.await.context("reminder sweep panicked")?;
    tracing::info!("talkroom server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
