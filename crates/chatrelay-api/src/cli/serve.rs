//! `chatrelay serve`: run the HTTP server until a shutdown signal, then drain
//! background work.

use std::time::Duration;

use chatrelay_types::config::RelayConfig;

use crate::http;
use crate::state::AppState;

pub async fn run(config: RelayConfig) -> anyhow::Result<()> {
    let drain_timeout = Duration::from_secs(config.shutdown.drain_timeout_secs);
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let state = AppState::init(config)?;
    let supervisor = state.supervisor.clone();

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "chat relay listening");

    let router = http::router::build_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!(
        in_flight = supervisor.in_flight(),
        "server stopped, draining background tasks"
    );
    let report = supervisor.shutdown(drain_timeout).await;
    if report.abandoned > 0 {
        tracing::warn!(abandoned = report.abandoned, "exiting with unfinished background tasks");
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
