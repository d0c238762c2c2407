//! Daemon API models

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Version response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Error body returned by every failing endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Installed app summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppResponse {
    pub id: String,
    pub status: String,
    pub version: u32,
    pub exposed: bool,
    pub exposed_local: bool,
    pub open_port: bool,
    pub domain: Option<String>,
    pub config: BTreeMap<String, serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

/// App list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppListResponse {
    pub apps: Vec<AppResponse>,
    pub total: usize,
}

/// Response of a lifecycle command accepted for execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResponse {
    pub app_id: String,
    pub status: String,
    pub job_id: Option<Uuid>,
}

/// Update request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRequest {
    #[serde(default)]
    pub perform_backup: bool,
}

/// Uninstall request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UninstallRequest {
    #[serde(default)]
    pub remove_backups: bool,
}

/// Restore request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreRequest {
    pub archive: String,
}

/// Queue job counts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobCountsResponse {
    pub waiting: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}
