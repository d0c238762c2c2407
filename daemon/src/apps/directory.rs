//! On-disk representation of apps
//!
//! Every method sanitizes the app id before building a path.

use minijinja::Environment;
use tracing::{debug, warn};

use crate::env::map::EnvMap;
use crate::errors::{HarborError, ValidationError};
use crate::filesys::dir::Dir;
use crate::models::definition::AppInfo;
use crate::storage::layout::StorageLayout;
use crate::utils::repo_id;

pub const COMPOSE_FILE: &str = "docker-compose.yml";
const CONFIG_FILE: &str = "config.json";
const DATA_DIR: &str = "data";
const TEMPLATE_SUFFIX: &str = ".template";
const DATA_DIR_MODE: u32 = 0o777;

/// Reject ids that could escape the storage root
pub fn sanitize_app_id(app_id: &str) -> Result<String, ValidationError> {
    let valid = !app_id.is_empty()
        && app_id.len() <= 64
        && app_id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        && !app_id.starts_with('-');

    if valid {
        Ok(app_id.to_string())
    } else {
        Err(ValidationError::InvalidAppId(app_id.to_string()))
    }
}

/// Reads and writes app definitions, installed copies and data directories
#[derive(Debug, Clone)]
pub struct AppDirectory {
    layout: StorageLayout,
    repo_id: String,
}

impl AppDirectory {
    pub fn new(layout: StorageLayout, apps_repo_url: &str) -> Self {
        Self {
            layout,
            repo_id: repo_id(apps_repo_url),
        }
    }

    fn repo_app_dir(&self, app_id: &str) -> Result<Dir, HarborError> {
        let app_id = sanitize_app_id(app_id)?;
        Ok(self.layout.repo_app_dir(&self.repo_id, &app_id))
    }

    pub fn installed_dir(&self, app_id: &str) -> Result<Dir, HarborError> {
        let app_id = sanitize_app_id(app_id)?;
        Ok(self.layout.installed_app_dir(&app_id))
    }

    pub fn data_dir(&self, app_id: &str) -> Result<Dir, HarborError> {
        let app_id = sanitize_app_id(app_id)?;
        Ok(self.layout.app_data_dir(&app_id))
    }

    /// Definition from the catalog repository, `None` if the catalog has no such app
    pub async fn get_app_info_from_app_store(
        &self,
        app_id: &str,
    ) -> Result<Option<AppInfo>, HarborError> {
        let file = self.repo_app_dir(app_id)?.file(CONFIG_FILE);
        if !file.exists().await {
            return Ok(None);
        }
        Ok(Some(file.read_json().await?))
    }

    /// Definition of the installed copy, `None` if the app is not installed
    pub async fn get_installed_app_info(&self, app_id: &str) -> Result<Option<AppInfo>, HarborError> {
        let file = self.installed_dir(app_id)?.file(CONFIG_FILE);
        if !file.exists().await {
            return Ok(None);
        }
        Ok(Some(file.read_json().await?))
    }

    /// Whether the installed copy has a compose file
    pub async fn is_installed(&self, app_id: &str) -> Result<bool, HarborError> {
        Ok(self.installed_dir(app_id)?.file(COMPOSE_FILE).exists().await)
    }

    /// Replace the installed copy with the catalog definition
    pub async fn copy_app_from_repo_to_installed(&self, app_id: &str) -> Result<(), HarborError> {
        let source = self.repo_app_dir(app_id)?;
        if !source.exists().await {
            return Err(ValidationError::AppNotFound(app_id.to_string()).into());
        }

        let target = self.installed_dir(app_id)?;
        target.delete().await?;
        source.copy_to(&target, true).await?;
        debug!("Copied {} to {}", source.path().display(), target.path().display());
        Ok(())
    }

    /// Read a file of the installed copy, `None` if absent
    pub async fn read_installed_file(
        &self,
        app_id: &str,
        name: &str,
    ) -> Result<Option<String>, HarborError> {
        self.installed_dir(app_id)?.file(name).read_string_opt().await
    }

    pub async fn write_docker_compose_yml(&self, app_id: &str, content: &str) -> Result<(), HarborError> {
        self.installed_dir(app_id)?
            .file(COMPOSE_FILE)
            .write_atomic(content.as_bytes())
            .await
    }

    pub async fn set_app_data_dir_permissions(&self, app_id: &str) -> Result<(), HarborError> {
        let dir = self.data_dir(app_id)?;
        dir.create().await?;
        dir.set_permissions_recursive(DATA_DIR_MODE).await
    }

    /// Populate the app's `data/` directory from the catalog.
    ///
    /// Files ending in `.template` are rendered against `env` and written without the
    /// suffix. Existing files are never overwritten.
    pub async fn copy_data_dir(&self, app_id: &str, env: &EnvMap) -> Result<(), HarborError> {
        let source = self.installed_dir(app_id)?.subdir(DATA_DIR);
        if !source.exists().await {
            return Ok(());
        }
        let target = self.data_dir(app_id)?.subdir(DATA_DIR);

        let mut templates = Environment::new();
        templates.set_keep_trailing_newline(true);

        for relative in source.walk_files().await? {
            let relative_str = relative.to_string_lossy();
            let (dest_name, is_template) = match relative_str.strip_suffix(TEMPLATE_SUFFIX) {
                Some(stripped) => (stripped.to_string(), true),
                None => (relative_str.to_string(), false),
            };

            let dest = target.file(&dest_name);
            if dest.exists().await {
                continue;
            }

            let source_file = source.file(&relative_str);
            if is_template {
                let text = source_file.read_string().await?;
                let rendered = templates
                    .render_str(&text, env)
                    .map_err(|e| HarborError::TemplateError(format!("{}: {}", relative_str, e)))?;
                dest.write_string(&rendered).await?;
            } else {
                if let Some(parent) = dest.path().parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::copy(source_file.path(), dest.path()).await?;
            }
        }

        Ok(())
    }

    pub async fn delete_app_folder(&self, app_id: &str) -> Result<(), HarborError> {
        self.installed_dir(app_id)?.delete().await
    }

    pub async fn delete_app_data_dir(&self, app_id: &str) -> Result<(), HarborError> {
        let dir = self.data_dir(app_id)?;
        if let Err(e) = dir.delete().await {
            warn!("Failed to delete data directory of {}: {}", app_id, e);
            return Err(e);
        }
        Ok(())
    }
}
