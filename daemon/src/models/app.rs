//! Persisted app record and lifecycle status

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted status of an installed app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppStatus {
    Missing,
    Installing,
    Running,
    Starting,
    Stopping,
    Stopped,
    Restarting,
    Updating,
    Uninstalling,
    Resetting,
    BackingUp,
    Restoring,
}

impl AppStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppStatus::Missing => "missing",
            AppStatus::Installing => "installing",
            AppStatus::Running => "running",
            AppStatus::Starting => "starting",
            AppStatus::Stopping => "stopping",
            AppStatus::Stopped => "stopped",
            AppStatus::Restarting => "restarting",
            AppStatus::Updating => "updating",
            AppStatus::Uninstalling => "uninstalling",
            AppStatus::Resetting => "resetting",
            AppStatus::BackingUp => "backing_up",
            AppStatus::Restoring => "restoring",
        }
    }

    /// Rest states every operation must eventually resolve to
    pub fn is_stable(&self) -> bool {
        matches!(
            self,
            AppStatus::Missing | AppStatus::Running | AppStatus::Stopped
        )
    }
}

impl fmt::Display for AppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-submitted configuration of an app.
///
/// Replayed in full on every lifecycle operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppForm {
    #[serde(default)]
    pub exposed: bool,

    #[serde(default)]
    pub exposed_local: bool,

    #[serde(default = "default_open_port")]
    pub open_port: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Field values keyed by their env variable
    #[serde(flatten)]
    pub values: BTreeMap<String, serde_json::Value>,
}

fn default_open_port() -> bool {
    true
}

impl Default for AppForm {
    fn default() -> Self {
        Self {
            exposed: false,
            exposed_local: false,
            open_port: true,
            domain: None,
            values: BTreeMap::new(),
        }
    }
}

impl AppForm {
    /// Value of a field rendered as env text; empty strings count as absent
    pub fn value_string(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.is_empty() => None,
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            other => Some(other.to_string()),
        }
    }

    /// Domain when set and not blank
    pub fn domain(&self) -> Option<&str> {
        self.domain
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }

    pub fn with_value(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }
}

/// Persisted app record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct App {
    pub id: String,
    pub status: AppStatus,

    /// Field values of the current form
    #[serde(default)]
    pub config: BTreeMap<String, serde_json::Value>,

    #[serde(default)]
    pub exposed: bool,

    #[serde(default)]
    pub exposed_local: bool,

    #[serde(default = "default_open_port")]
    pub open_port: bool,

    #[serde(default)]
    pub domain: Option<String>,

    /// Installed definition revision
    #[serde(default)]
    pub version: u32,

    /// Bumped by every command that transitions the status
    #[serde(default)]
    pub operation_seq: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl App {
    pub fn new(id: &str, status: AppStatus, form: &AppForm, version: u32) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            status,
            config: form.values.clone(),
            exposed: form.exposed,
            exposed_local: form.exposed_local,
            open_port: form.open_port,
            domain: form.domain().map(str::to_string),
            version,
            operation_seq: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// The complete, currently-effective form of this app
    pub fn form(&self) -> AppForm {
        AppForm {
            exposed: self.exposed,
            exposed_local: self.exposed_local,
            open_port: self.open_port,
            domain: self.domain.clone(),
            values: self.config.clone(),
        }
    }

    /// A `missing` record is equivalent to no record
    pub fn is_present(&self) -> bool {
        self.status != AppStatus::Missing
    }
}
