//! Settings file management

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;

/// Daemon settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON
    #[serde(default)]
    pub log_json: bool,

    /// Also write logs to the storage layout's logs directory
    #[serde(default)]
    pub log_to_file: bool,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Version of the platform itself, checked against app minimums
    #[serde(default = "default_platform_version")]
    pub platform_version: String,

    /// CPU architecture apps must support
    #[serde(default = "default_architecture")]
    pub architecture: String,

    /// LAN address used to build plain http app URLs
    #[serde(default = "default_internal_ip")]
    pub internal_ip: String,

    /// Local domain for `{app_id}.{local_domain}` exposure
    #[serde(default = "default_local_domain")]
    pub local_domain: String,

    /// Demo instances cap the number of installed apps
    #[serde(default)]
    pub demo_mode: bool,

    /// Catalog repository
    #[serde(default = "default_apps_repo_url")]
    pub apps_repo_url: String,

    /// Container compose binary; `docker` runs as `docker compose`
    #[serde(default = "default_compose_binary")]
    pub compose_binary: String,

    /// Queue configuration
    #[serde(default)]
    pub queue: QueueSettings,
}

fn default_platform_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_architecture() -> String {
    match std::env::consts::ARCH {
        "x86_64" => "amd64".to_string(),
        "aarch64" => "arm64".to_string(),
        other => other.to_string(),
    }
}

fn default_internal_ip() -> String {
    "localhost".to_string()
}

fn default_local_domain() -> String {
    "harbor.lan".to_string()
}

fn default_apps_repo_url() -> String {
    "https://github.com/harbor-sh/appstore".to_string()
}

fn default_compose_binary() -> String {
    "docker".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_to_file: false,
            server: ServerSettings::default(),
            platform_version: default_platform_version(),
            architecture: default_architecture(),
            internal_ip: default_internal_ip(),
            local_domain: default_local_domain(),
            demo_mode: false,
            apps_repo_url: default_apps_repo_url(),
            compose_binary: default_compose_binary(),
            queue: QueueSettings::default(),
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5050
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Durable queue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Wait for a lifecycle job result
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,

    /// Wait for jobs that carry a backup
    #[serde(default = "default_backup_timeout_secs")]
    pub backup_timeout_secs: u64,

    /// Consumers on the repeating lane
    #[serde(default = "default_repeating_concurrency")]
    pub repeating_concurrency: usize,

    #[serde(default = "default_system_info_interval_secs")]
    pub system_info_interval_secs: u64,

    #[serde(default = "default_repo_update_interval_secs")]
    pub repo_update_interval_secs: u64,

    /// Completed jobs kept in the journal
    #[serde(default = "default_completed_retention")]
    pub completed_retention: usize,

    /// Failed jobs kept in the journal
    #[serde(default = "default_failed_retention")]
    pub failed_retention: usize,
}

fn default_timeout_secs() -> u64 {
    5 * 60
}

fn default_backup_timeout_secs() -> u64 {
    15 * 60
}

fn default_repeating_concurrency() -> usize {
    3
}

fn default_system_info_interval_secs() -> u64 {
    60
}

fn default_repo_update_interval_secs() -> u64 {
    30 * 60
}

fn default_completed_retention() -> usize {
    200
}

fn default_failed_retention() -> usize {
    500
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_timeout_secs(),
            backup_timeout_secs: default_backup_timeout_secs(),
            repeating_concurrency: default_repeating_concurrency(),
            system_info_interval_secs: default_system_info_interval_secs(),
            repo_update_interval_secs: default_repo_update_interval_secs(),
            completed_retention: default_completed_retention(),
            failed_retention: default_failed_retention(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_fill_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"log_level": "debug", "demo_mode": true, "queue": {"repeating_concurrency": 5}}"#)
                .unwrap();
        assert_eq!(settings.log_level, LogLevel::Debug);
        assert!(settings.demo_mode);
        assert_eq!(settings.queue.repeating_concurrency, 5);
        assert_eq!(settings.queue.completed_retention, 200);
        assert_eq!(settings.queue.failed_retention, 500);
        assert_eq!(settings.server.port, 5050);
    }
}
