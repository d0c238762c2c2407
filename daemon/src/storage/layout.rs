//! Storage layout configuration

use std::path::PathBuf;

use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// On-disk layout of the daemon's storage root
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the settings file path
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    /// Platform-wide base environment shared by every app
    pub fn base_env_file(&self) -> File {
        File::new(self.base_dir.join(".env"))
    }

    /// Catalog repositories, one checkout per repository id
    pub fn repos_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("repos"))
    }

    /// Checkout of a single catalog repository
    pub fn repo_dir(&self, repo_id: &str) -> Dir {
        self.repos_dir().subdir(repo_id)
    }

    /// Canonical definition of an app inside a catalog repository
    pub fn repo_app_dir(&self, repo_id: &str, app_id: &str) -> Dir {
        self.repo_dir(repo_id).subdir("apps").subdir(app_id)
    }

    /// Installed copies of apps
    pub fn apps_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("apps"))
    }

    /// Installed copy of a single app
    pub fn installed_app_dir(&self, app_id: &str) -> Dir {
        self.apps_dir().subdir(app_id)
    }

    /// Per-app data roots
    pub fn app_data_root(&self) -> Dir {
        Dir::new(self.base_dir.join("app-data"))
    }

    /// Data root of a single app, holding `app.env` and `data/`
    pub fn app_data_dir(&self, app_id: &str) -> Dir {
        self.app_data_root().subdir(app_id)
    }

    /// Generated environment file of an app
    pub fn app_env_file(&self, app_id: &str) -> File {
        self.app_data_dir(app_id).file("app.env")
    }

    /// Persisted daemon state
    pub fn state_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("state"))
    }

    /// Persisted app records
    pub fn apps_state_file(&self) -> File {
        self.state_dir().file("apps.json")
    }

    /// Per-install seed used to derive generated secrets
    pub fn seed_file(&self) -> File {
        self.state_dir().file("seed")
    }

    /// Latest system info snapshot
    pub fn system_info_file(&self) -> File {
        self.state_dir().file("system-info.json")
    }

    /// Durable queue journal
    pub fn queue_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("queue"))
    }

    /// App backups
    pub fn backups_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("backups"))
    }

    /// Get the logs directory
    pub fn logs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("logs"))
    }

    /// Setup the storage layout (create directories)
    pub async fn setup(&self) -> Result<(), crate::errors::HarborError> {
        self.repos_dir().create().await?;
        self.apps_dir().create().await?;
        self.app_data_root().create().await?;
        self.state_dir().create().await?;
        self.queue_dir().create().await?;
        self.backups_dir().create().await?;
        self.logs_dir().create().await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self::new("/var/lib/harbor")
    }
}
