//! Catalog repository checkout

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::HarborError;
use crate::storage::layout::StorageLayout;
use crate::utils::repo_id;

/// Clones and refreshes catalog repositories with git
pub struct CatalogRepo {
    layout: StorageLayout,
}

impl CatalogRepo {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    /// Clone the repository unless a checkout already exists
    pub async fn clone_repo(&self, url: &str) -> Result<String, HarborError> {
        let target = self.layout.repo_dir(&repo_id(url));
        if target.subdir(".git").exists().await {
            debug!("Repository {} already cloned", url);
            return Ok(format!("Repository {} already cloned", url));
        }

        self.layout.repos_dir().create().await?;
        // leftovers of an interrupted clone
        target.delete().await?;

        info!("Cloning repository {} to {}", url, target.path().display());
        let dest = target.path().display().to_string();
        git(None, &["clone", "--depth", "1", url, &dest]).await?;
        Ok(format!("Repository {} cloned", url))
    }

    /// Fetch and hard-reset to the upstream branch, cloning when absent
    pub async fn update_repo(&self, url: &str) -> Result<String, HarborError> {
        let target = self.layout.repo_dir(&repo_id(url));
        if !target.subdir(".git").exists().await {
            return self.clone_repo(url).await;
        }

        debug!("Updating repository {}", url);
        git(Some(target.path()), &["fetch", "--depth", "1", "origin"]).await?;
        git(Some(target.path()), &["reset", "--hard", "FETCH_HEAD"]).await?;
        info!("Repository {} updated", url);
        Ok(format!("Repository {} updated", url))
    }
}

async fn git(dir: Option<&Path>, args: &[&str]) -> Result<(), HarborError> {
    let mut cmd = Command::new("git");
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }
    let output = cmd
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| HarborError::RepoError(format!("Failed to run git {}: {}", args[0], e)))?;

    if !output.status.success() {
        return Err(HarborError::RepoError(format!(
            "git {} failed: {}",
            args[0],
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}
