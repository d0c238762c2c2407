//! Lifecycle job messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::app::AppForm;

/// Commands targeting a single app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppCommand {
    Install,
    Start,
    Stop,
    Restart,
    Uninstall,
    Update,
    Reset,
    GenerateEnv,
    Backup,
    Restore,
}

impl AppCommand {
    /// Verb used in notification event names
    pub fn as_str(&self) -> &'static str {
        match self {
            AppCommand::Install => "install",
            AppCommand::Start => "start",
            AppCommand::Stop => "stop",
            AppCommand::Restart => "restart",
            AppCommand::Uninstall => "uninstall",
            AppCommand::Update => "update",
            AppCommand::Reset => "reset",
            AppCommand::GenerateEnv => "generate_env",
            AppCommand::Backup => "backup",
            AppCommand::Restore => "restore",
        }
    }
}

impl std::fmt::Display for AppCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commands against the catalog repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoCommand {
    Clone,
    Update,
}

impl RepoCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoCommand::Clone => "clone",
            RepoCommand::Update => "update",
        }
    }
}

/// Host maintenance commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemCommand {
    SystemInfo,
}

impl SystemCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemCommand::SystemInfo => "system_info",
        }
    }
}

/// Optional arguments of an app job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppJobArgs {
    /// Start/stop without regenerating the environment file
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skip_env: bool,

    /// Archive to restore from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<String>,
}

/// Queue message; unknown `(type, command)` pairs fail to deserialize
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobPayload {
    App {
        command: AppCommand,
        app_id: String,
        #[serde(default)]
        form: AppForm,
        #[serde(default)]
        args: AppJobArgs,
    },
    Repo {
        command: RepoCommand,
        url: String,
    },
    System {
        command: SystemCommand,
    },
}

impl JobPayload {
    pub fn app(command: AppCommand, app_id: &str, form: AppForm) -> Self {
        JobPayload::App {
            command,
            app_id: app_id.to_string(),
            form,
            args: AppJobArgs::default(),
        }
    }

    pub fn app_id(&self) -> Option<&str> {
        match self {
            JobPayload::App { app_id, .. } => Some(app_id),
            _ => None,
        }
    }

    /// Short human label, e.g. `app:install`
    pub fn label(&self) -> String {
        match self {
            JobPayload::App { command, .. } => format!("app:{}", command),
            JobPayload::Repo { command, .. } => format!("repo:{}", command.as_str()),
            JobPayload::System { command } => format!("system:{}", command.as_str()),
        }
    }
}

/// Consumption track of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    /// User-triggered commands, consumed one at a time
    Immediate,
    /// Scheduler-triggered maintenance
    Repeating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Waiting,
    Active,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// Outcome reported by the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub success: bool,
    pub message: String,
}

impl JobResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Journal entry of a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub lane: Lane,
    pub payload: JobPayload,
    pub state: JobState,
    #[serde(default)]
    pub result: Option<JobResult>,
    #[serde(default)]
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Returned by enqueue, used to await the job's result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobHandle {
    pub id: Uuid,
    pub lane: Lane,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_wire_format() {
        let payload = JobPayload::app(
            AppCommand::GenerateEnv,
            "nextcloud",
            AppForm::default().with_value("ADMIN", "root"),
        );
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["type"], "app");
        assert_eq!(value["command"], "generate_env");
        assert_eq!(value["app_id"], "nextcloud");
        assert_eq!(value["form"]["ADMIN"], "root");

        let repo: JobPayload =
            serde_json::from_str(r#"{"type": "repo", "command": "clone", "url": "https://x"}"#).unwrap();
        assert_eq!(
            repo,
            JobPayload::Repo {
                command: RepoCommand::Clone,
                url: "https://x".to_string()
            }
        );
        assert_eq!(repo.label(), "repo:clone");
    }

    #[test]
    fn test_unknown_pairs_rejected() {
        for raw in [
            r#"{"type": "app", "command": "explode", "app_id": "a"}"#,
            r#"{"type": "repo", "command": "install", "url": "https://x"}"#,
            r#"{"type": "system", "command": "reboot"}"#,
            r#"{"type": "cluster", "command": "start"}"#,
        ] {
            assert!(serde_json::from_str::<JobPayload>(raw).is_err(), "{raw}");
        }
    }
}
