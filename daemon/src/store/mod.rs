//! Persisted app state

pub mod file;

use async_trait::async_trait;

use crate::errors::HarborError;
use crate::models::app::{App, AppStatus};

/// Guard on a write: only apply when the record's operation sequence matches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fence {
    Any,
    Seq(u64),
}

impl Fence {
    fn admits(&self, app: &App) -> bool {
        match self {
            Fence::Any => true,
            Fence::Seq(seq) => app.operation_seq == *seq,
        }
    }
}

/// Partial update of an app record
#[derive(Debug, Clone, Default)]
pub struct AppPatch {
    pub status: Option<AppStatus>,
    pub config: Option<std::collections::BTreeMap<String, serde_json::Value>>,
    pub exposed: Option<bool>,
    pub exposed_local: Option<bool>,
    pub open_port: Option<bool>,
    pub domain: Option<Option<String>>,
    pub version: Option<u32>,

    /// Start a new operation: increments `operation_seq`
    pub bump_seq: bool,
}

impl AppPatch {
    pub fn status(status: AppStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn begin(status: AppStatus) -> Self {
        Self {
            status: Some(status),
            bump_seq: true,
            ..Default::default()
        }
    }

    pub(crate) fn apply(self, app: &mut App) {
        if let Some(status) = self.status {
            app.status = status;
        }
        if let Some(config) = self.config {
            app.config = config;
        }
        if let Some(exposed) = self.exposed {
            app.exposed = exposed;
        }
        if let Some(exposed_local) = self.exposed_local {
            app.exposed_local = exposed_local;
        }
        if let Some(open_port) = self.open_port {
            app.open_port = open_port;
        }
        if let Some(domain) = self.domain {
            app.domain = domain;
        }
        if let Some(version) = self.version {
            app.version = version;
        }
        if self.bump_seq {
            app.operation_seq += 1;
        }
        app.updated_at = chrono::Utc::now();
    }
}

/// CRUD over app records keyed by id
#[async_trait]
pub trait AppRepository: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<App>, HarborError>;

    async fn list(&self) -> Result<Vec<App>, HarborError>;

    /// Insert a record, replacing a `missing` one; fails if a present record exists
    async fn create(&self, app: App) -> Result<App, HarborError>;

    /// `None` when the record is absent or the fence rejects the write
    async fn update(&self, id: &str, fence: Fence, patch: AppPatch)
        -> Result<Option<App>, HarborError>;

    /// `false` when the record is absent or the fence rejects the delete
    async fn delete(&self, id: &str, fence: Fence) -> Result<bool, HarborError>;
}
