//! Runtime lifecycle: bind, serve, reaper, shutdown.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use tokio_util::sync::CancellationToken;

use crate::common::AppConfig;
use crate::receive::reaper;
use crate::server::routes;
use crate::server::state::AppState;

/// Starts the HTTP server on `port` and returns `(bound_port, handle)`.
///
/// Binds a std listener first so an in-use port fails fast with a clear
/// message instead of dying inside the accept loop.
pub async fn start_server(app: axum::Router, port: u16) -> Result<(u16, axum_server::Handle)> {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = std::net::TcpListener::bind(addr).context(
        "Failed to bind to port - port already in use.\n\n\
         Is another chunkdrop instance running?\n\
         Or is another service using this port?",
    )?;

    listener
        .set_nonblocking(true)
        .context("Failed to set listener to non-blocking mode")?;

    let port = listener.local_addr()?.port();

    let server_handle = axum_server::Handle::new();
    let server_handle_clone = server_handle.clone();

    tokio::spawn(async move {
        if let Err(e) = axum_server::from_tcp(listener)
            .handle(server_handle_clone)
            .serve(app.into_make_service())
            .await
        {
            tracing::error!(error = %e, "server error");
        }
    });

    Ok((port, server_handle))
}

/// Run the receiving server until Ctrl+C.
pub async fn serve(base_dir: PathBuf, config: AppConfig) -> Result<()> {
    let base_dir = base_dir
        .canonicalize()
        .with_context(|| format!("Invalid base directory: {}", base_dir.display()))?;
    ensure!(
        base_dir.is_dir(),
        "Base directory does not exist or is not a directory: {}",
        base_dir.display()
    );

    let state = AppState::new(base_dir.clone(), &config);
    let app = routes::create_router(&state, config.server.body_limit);

    let (port, server_handle) = start_server(app, config.server.port).await?;
    tracing::info!(
        port,
        base_dir = %base_dir.display(),
        read_only = config.server.read_only,
        "chunkdrop receiving server started"
    );

    let shutdown = CancellationToken::new();
    let reaper_task = reaper::spawn(state.registry.clone(), config.reaper, shutdown.clone());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!(live_sessions = state.registry.len(), "shutting down");

    shutdown.cancel();
    server_handle.graceful_shutdown(Some(Duration::from_secs(5)));
    reaper_task.await.context("reaper task panicked")?;

    Ok(())
}
