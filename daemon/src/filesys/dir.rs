//! Directory operations

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::errors::HarborError;
use crate::filesys::file::File;

/// A directory wrapper with path
#[derive(Debug, Clone)]
pub struct Dir {
    path: PathBuf,
}

impl Dir {
    /// Create a new directory reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the directory exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Create the directory (and parents)
    pub async fn create(&self) -> Result<(), HarborError> {
        fs::create_dir_all(&self.path).await?;
        Ok(())
    }

    /// Delete the directory and all contents
    pub async fn delete(&self) -> Result<(), HarborError> {
        if self.exists().await {
            fs::remove_dir_all(&self.path).await?;
        }
        Ok(())
    }

    /// List subdirectory names, sorted
    pub async fn list_dir_names(&self) -> Result<Vec<String>, HarborError> {
        let mut names = Vec::new();
        if !self.exists().await {
            return Ok(names);
        }

        let mut entries = fs::read_dir(&self.path).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }

        names.sort();
        Ok(names)
    }

    /// All regular files below this directory, as paths relative to it
    pub async fn walk_files(&self) -> Result<Vec<PathBuf>, HarborError> {
        let mut files = Vec::new();
        let mut pending = vec![PathBuf::new()];

        while let Some(relative) = pending.pop() {
            let mut entries = fs::read_dir(self.path.join(&relative)).await?;
            while let Some(entry) = entries.next_entry().await? {
                let child = relative.join(entry.file_name());
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(child);
                } else if file_type.is_file() {
                    files.push(child);
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// Recursively copy this directory into `target`.
    ///
    /// With `overwrite == false`, files already present in `target` are left untouched.
    pub async fn copy_to(&self, target: &Dir, overwrite: bool) -> Result<(), HarborError> {
        target.create().await?;
        for relative in self.walk_files().await? {
            let dest = target.path.join(&relative);
            if !overwrite && fs::metadata(&dest).await.is_ok() {
                continue;
            }
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::copy(self.path.join(&relative), &dest).await?;
        }
        Ok(())
    }

    /// Apply `mode` to this directory and everything below it.
    ///
    /// A no-op on non-Unix platforms.
    pub async fn set_permissions_recursive(&self, mode: u32) -> Result<(), HarborError> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mut pending = vec![self.path.clone()];
            while let Some(dir) = pending.pop() {
                fs::set_permissions(&dir, std::fs::Permissions::from_mode(mode)).await?;
                let mut entries = fs::read_dir(&dir).await?;
                while let Some(entry) = entries.next_entry().await? {
                    let file_type = entry.file_type().await?;
                    if file_type.is_dir() {
                        pending.push(entry.path());
                    } else if file_type.is_file() {
                        fs::set_permissions(entry.path(), std::fs::Permissions::from_mode(mode))
                            .await?;
                    }
                }
            }
        }
        #[cfg(not(unix))]
        let _ = mode;
        Ok(())
    }

    /// Get a file within this directory
    pub fn file(&self, name: &str) -> File {
        File::new(self.path.join(name))
    }

    /// Get a subdirectory
    pub fn subdir(&self, name: &str) -> Dir {
        Dir::new(self.path.join(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_copy_to_without_overwrite_keeps_existing() {
        let tmp = tempfile::tempdir().unwrap();
        let source = Dir::new(tmp.path().join("source"));
        let target = Dir::new(tmp.path().join("target"));

        source.file("config/settings.ini").write_string("new").await.unwrap();
        source.file("other.txt").write_string("other").await.unwrap();
        target.file("config/settings.ini").write_string("mine").await.unwrap();

        source.copy_to(&target, false).await.unwrap();

        assert_eq!(target.file("config/settings.ini").read_string().await.unwrap(), "mine");
        assert_eq!(target.file("other.txt").read_string().await.unwrap(), "other");
    }

    #[tokio::test]
    async fn test_walk_files_is_relative_and_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = Dir::new(tmp.path());
        dir.file("b/two").write_string("2").await.unwrap();
        dir.file("a").write_string("1").await.unwrap();

        let files = dir.walk_files().await.unwrap();
        assert_eq!(files, vec![PathBuf::from("a"), PathBuf::from("b/two")]);
    }
}
