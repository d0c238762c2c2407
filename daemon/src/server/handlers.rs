//! HTTP request handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use openapi_server::models::{
    AppListResponse, AppResponse, HealthResponse, JobCountsResponse, OperationResponse,
    RestoreRequest, UninstallRequest, UpdateRequest, VersionResponse,
};
use serde::de::DeserializeOwned;

use crate::errors::ValidationError;
use crate::lifecycle::Operation;
use crate::models::app::{App, AppForm};
use crate::server::errors::ApiError;
use crate::server::state::ServerState;
use crate::utils::version_info;

fn app_response(app: App) -> AppResponse {
    AppResponse {
        id: app.id,
        status: app.status.to_string(),
        version: app.version,
        exposed: app.exposed,
        exposed_local: app.exposed_local,
        open_port: app.open_port,
        domain: app.domain,
        config: app.config,
        updated_at: app.updated_at,
    }
}

/// Commands return as soon as the job is queued
fn accepted(operation: Operation) -> impl IntoResponse {
    (
        StatusCode::ACCEPTED,
        Json(OperationResponse {
            app_id: operation.app_id,
            status: operation.status.to_string(),
            job_id: operation.job.map(|job| job.id),
        }),
    )
}

/// Parse a request body that may be omitted entirely
fn optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        ApiError::from(ValidationError::InvalidFieldValue {
            field: "body".to_string(),
            reason: e.to_string(),
        })
    })
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "harbord".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

pub async fn list_apps_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<impl IntoResponse, ApiError> {
    let apps: Vec<AppResponse> = state
        .lifecycle
        .list_apps()
        .await?
        .into_iter()
        .map(app_response)
        .collect();
    let total = apps.len();
    Ok(Json(AppListResponse { apps, total }))
}

pub async fn get_app_handler(
    State(state): State<Arc<ServerState>>,
    Path(app_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    match state.lifecycle.get_app(&app_id).await? {
        Some(app) => Ok(Json(app_response(app))),
        None => Err(ValidationError::AppNotFound(app_id).into()),
    }
}

pub async fn install_handler(
    State(state): State<Arc<ServerState>>,
    Path(app_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let form: AppForm = optional_body(&body)?;
    let operation = state.lifecycle.install(&app_id, form).await?;
    Ok(accepted(operation))
}

pub async fn start_handler(
    State(state): State<Arc<ServerState>>,
    Path(app_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(accepted(state.lifecycle.start(&app_id).await?))
}

pub async fn stop_handler(
    State(state): State<Arc<ServerState>>,
    Path(app_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(accepted(state.lifecycle.stop(&app_id).await?))
}

pub async fn restart_handler(
    State(state): State<Arc<ServerState>>,
    Path(app_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(accepted(state.lifecycle.restart(&app_id).await?))
}

pub async fn uninstall_handler(
    State(state): State<Arc<ServerState>>,
    Path(app_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: UninstallRequest = optional_body(&body)?;
    let operation = state
        .lifecycle
        .uninstall(&app_id, request.remove_backups)
        .await?;
    Ok(accepted(operation))
}

pub async fn update_handler(
    State(state): State<Arc<ServerState>>,
    Path(app_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: UpdateRequest = optional_body(&body)?;
    let operation = state
        .lifecycle
        .update(&app_id, request.perform_backup)
        .await?;
    Ok(accepted(operation))
}

pub async fn config_handler(
    State(state): State<Arc<ServerState>>,
    Path(app_id): Path<String>,
    Json(form): Json<AppForm>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(accepted(state.lifecycle.update_config(&app_id, form).await?))
}

pub async fn reset_handler(
    State(state): State<Arc<ServerState>>,
    Path(app_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(accepted(state.lifecycle.reset(&app_id).await?))
}

pub async fn backup_handler(
    State(state): State<Arc<ServerState>>,
    Path(app_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(accepted(state.lifecycle.backup(&app_id).await?))
}

pub async fn restore_handler(
    State(state): State<Arc<ServerState>>,
    Path(app_id): Path<String>,
    Json(request): Json<RestoreRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let operation = state.lifecycle.restore(&app_id, &request.archive).await?;
    Ok(accepted(operation))
}

/// Queue job counts
pub async fn jobs_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let counts = state.queue.counts().await;
    Json(JobCountsResponse {
        waiting: counts.waiting,
        active: counts.active,
        completed: counts.completed,
        failed: counts.failed,
    })
}
