//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::HarborError;
use crate::server::handlers::{
    backup_handler, config_handler, get_app_handler, health_handler, install_handler,
    jobs_handler, list_apps_handler, reset_handler, restart_handler, restore_handler,
    start_handler, stop_handler, uninstall_handler, update_handler, version_handler,
};
use crate::server::state::ServerState;
use crate::server::ws::ws_handler;

/// Build the API router
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        // Health and version
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        // Apps
        .route("/apps", get(list_apps_handler))
        .route("/apps/{id}", get(get_app_handler))
        .route("/apps/{id}/install", post(install_handler))
        .route("/apps/{id}/start", post(start_handler))
        .route("/apps/{id}/stop", post(stop_handler))
        .route("/apps/{id}/restart", post(restart_handler))
        .route("/apps/{id}/uninstall", post(uninstall_handler))
        .route("/apps/{id}/update", post(update_handler))
        .route("/apps/{id}/config", post(config_handler))
        .route("/apps/{id}/reset", post(reset_handler))
        .route("/apps/{id}/backup", post(backup_handler))
        .route("/apps/{id}/restore", post(restore_handler))
        // Queue
        .route("/jobs", get(jobs_handler))
        // Notifications
        .route("/ws", get(ws_handler))
        // State and middleware
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), HarborError>>, HarborError> {
    let app = router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| HarborError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| HarborError::ServerError(e.to_string()))
    });

    Ok(handle)
}
