//! JSON file backed app repository

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::{HarborError, ValidationError};
use crate::filesys::file::File;
use crate::models::app::App;
use crate::store::{AppPatch, AppRepository, Fence};

/// Keeps every record in memory and rewrites the state file atomically on each change
pub struct FileAppRepository {
    file: File,
    apps: Mutex<BTreeMap<String, App>>,
}

impl FileAppRepository {
    pub async fn open(file: File) -> Result<Self, HarborError> {
        let apps: BTreeMap<String, App> = if file.exists().await {
            file.read_json().await?
        } else {
            BTreeMap::new()
        };
        debug!("Loaded {} app records from {}", apps.len(), file.path().display());

        Ok(Self {
            file,
            apps: Mutex::new(apps),
        })
    }
}

#[async_trait]
impl AppRepository for FileAppRepository {
    async fn get(&self, id: &str) -> Result<Option<App>, HarborError> {
        Ok(self.apps.lock().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<App>, HarborError> {
        Ok(self.apps.lock().await.values().cloned().collect())
    }

    async fn create(&self, mut app: App) -> Result<App, HarborError> {
        let mut apps = self.apps.lock().await;
        if let Some(previous) = apps.get(&app.id) {
            if previous.is_present() {
                // a concurrent install got here first
                return Err(ValidationError::InvalidStatus {
                    app_id: app.id.clone(),
                    operation: "install".to_string(),
                    status: previous.status.to_string(),
                }
                .into());
            }
            // results of the replaced record must stay fenced out
            app.operation_seq = app.operation_seq.max(previous.operation_seq + 1);
        }

        let mut next = apps.clone();
        next.insert(app.id.clone(), app.clone());
        self.file.write_json(&next).await?;
        *apps = next;
        Ok(app)
    }

    async fn update(
        &self,
        id: &str,
        fence: Fence,
        patch: AppPatch,
    ) -> Result<Option<App>, HarborError> {
        let mut apps = self.apps.lock().await;
        let Some(current) = apps.get(id) else {
            return Ok(None);
        };
        if !fence.admits(current) {
            return Ok(None);
        }

        let mut updated = current.clone();
        patch.apply(&mut updated);

        let mut next = apps.clone();
        next.insert(id.to_string(), updated.clone());
        self.file.write_json(&next).await?;
        *apps = next;
        Ok(Some(updated))
    }

    async fn delete(&self, id: &str, fence: Fence) -> Result<bool, HarborError> {
        let mut apps = self.apps.lock().await;
        match apps.get(id) {
            Some(current) if fence.admits(current) => {}
            _ => return Ok(false),
        }

        let mut next = apps.clone();
        next.remove(id);
        self.file.write_json(&next).await?;
        *apps = next;
        Ok(true)
    }
}
