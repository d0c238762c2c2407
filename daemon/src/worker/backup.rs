//! Backup collaborator

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::apps::directory::sanitize_app_id;
use crate::errors::HarborError;
use crate::storage::layout::StorageLayout;

/// Archive transfer of an app, only invoked while its stack is stopped
#[async_trait]
pub trait BackupManager: Send + Sync {
    /// Returns the name of the created archive
    async fn backup_app(&self, app_id: &str) -> Result<String, HarborError>;

    async fn restore_app(&self, app_id: &str, archive: &str) -> Result<(), HarborError>;

    async fn list_backups(&self, app_id: &str) -> Result<Vec<String>, HarborError>;

    async fn delete_backups(&self, app_id: &str) -> Result<(), HarborError>;
}

/// Directory snapshots under `backups/<app_id>/<timestamp>/`
pub struct SnapshotBackup {
    layout: StorageLayout,
}

impl SnapshotBackup {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }
}

#[async_trait]
impl BackupManager for SnapshotBackup {
    async fn backup_app(&self, app_id: &str) -> Result<String, HarborError> {
        let app_id = sanitize_app_id(app_id)?;
        let installed = self.layout.installed_app_dir(&app_id);
        if !installed.exists().await {
            return Err(HarborError::BackupError(format!("App {} is not installed", app_id)));
        }

        let name = Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string();
        let snapshot = self.layout.backups_dir().subdir(&app_id).subdir(&name);

        installed.copy_to(&snapshot.subdir("app"), true).await?;
        let data = self.layout.app_data_dir(&app_id);
        if data.exists().await {
            data.copy_to(&snapshot.subdir("app-data"), true).await?;
        }

        info!("Backed up {} to {}", app_id, snapshot.path().display());
        Ok(name)
    }

    async fn restore_app(&self, app_id: &str, archive: &str) -> Result<(), HarborError> {
        let app_id = sanitize_app_id(app_id)?;
        if archive.is_empty() || archive.contains(['/', '\\']) || archive.contains("..") {
            return Err(HarborError::BackupError(format!("Invalid archive name: {}", archive)));
        }

        let snapshot = self.layout.backups_dir().subdir(&app_id).subdir(archive);
        if !snapshot.exists().await {
            return Err(HarborError::BackupError(format!(
                "Backup {} of {} not found",
                archive, app_id
            )));
        }

        let installed = self.layout.installed_app_dir(&app_id);
        installed.delete().await?;
        snapshot.subdir("app").copy_to(&installed, true).await?;

        let data = self.layout.app_data_dir(&app_id);
        data.delete().await?;
        let saved_data = snapshot.subdir("app-data");
        if saved_data.exists().await {
            saved_data.copy_to(&data, true).await?;
        }

        info!("Restored {} from {}", app_id, archive);
        Ok(())
    }

    async fn list_backups(&self, app_id: &str) -> Result<Vec<String>, HarborError> {
        let app_id = sanitize_app_id(app_id)?;
        self.layout.backups_dir().subdir(&app_id).list_dir_names().await
    }

    async fn delete_backups(&self, app_id: &str) -> Result<(), HarborError> {
        let app_id = sanitize_app_id(app_id)?;
        self.layout.backups_dir().subdir(&app_id).delete().await
    }
}
