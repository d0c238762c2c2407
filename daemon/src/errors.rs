//! Error types for the Harbor daemon

use thiserror::Error;

/// Main error type for the Harbor daemon
#[derive(Error, Debug)]
pub enum HarborError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("docker compose {command} failed for {app_id}: {stderr}")]
    Compose {
        app_id: String,
        command: String,
        stderr: String,
    },

    #[error("Template error: {0}")]
    TemplateError(String),

    #[error("Queue error: {0}")]
    QueueError(String),

    #[error("Timed out after {0:?} waiting for job {1}")]
    Timeout(std::time::Duration, uuid::Uuid),

    #[error("Repository error: {0}")]
    RepoError(String),

    #[error("Backup error: {0}")]
    BackupError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HarborError {
    /// Docker refuses to remove an image still referenced by another app's containers.
    pub fn is_image_conflict(&self) -> bool {
        match self {
            HarborError::Compose { stderr, .. } => {
                let stderr = stderr.to_lowercase();
                stderr.contains("conflict")
                    && (stderr.contains("image is being used")
                        || stderr.contains("is using its referenced image")
                        || stderr.contains("image is referenced in multiple repositories"))
            }
            _ => false,
        }
    }

    /// Compose could not load the project file: absent, unparsable or invalid.
    pub fn is_broken_compose_file(&self) -> bool {
        match self {
            HarborError::Compose { stderr, .. } => {
                let stderr = stderr.to_lowercase();
                let missing = stderr.contains("no such file or directory")
                    && stderr.contains("compose.y");
                missing
                    || stderr.contains("no configuration file provided")
                    || stderr.contains("yaml:")
                    || stderr.contains("invalid compose project")
                    || stderr.contains("validating")
            }
            _ => false,
        }
    }
}

impl From<anyhow::Error> for HarborError {
    fn from(err: anyhow::Error) -> Self {
        HarborError::Internal(err.to_string())
    }
}

/// Synchronous rejections raised before any status mutation or enqueue
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("App {0} not found")]
    AppNotFound(String),

    #[error("Invalid app id: {0}")]
    InvalidAppId(String),

    #[error("A domain is required to expose app {0}")]
    DomainRequired(String),

    #[error("Domain {0} is not valid")]
    InvalidDomain(String),

    #[error("App {0} cannot be exposed")]
    NotExposable(String),

    #[error("App {0} must be exposed")]
    ForceExposeRequired(String),

    #[error("Domain {domain} is already used by app {other}")]
    DomainInUse { domain: String, other: String },

    #[error("App {app_id} requires platform version {required} or newer (current: {current})")]
    VersionTooLow {
        app_id: String,
        required: String,
        current: String,
    },

    #[error("App {app_id} does not support architecture {arch}")]
    ArchitectureNotSupported { app_id: String, arch: String },

    #[error("Demo mode allows at most {0} installed apps")]
    DemoLimitReached(usize),

    #[error("Field {0} is required")]
    MissingRequiredField(String),

    #[error("Field {field} is invalid: {reason}")]
    InvalidFieldValue { field: String, reason: String },

    #[error("App {app_id} cannot be {operation} while {status}")]
    InvalidStatus {
        app_id: String,
        operation: String,
        status: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_conflict_detection() {
        let err = HarborError::Compose {
            app_id: "nextcloud".to_string(),
            command: "down".to_string(),
            stderr: "Error response from daemon: conflict: unable to remove repository reference \"redis:7\" (must force) - container 1a2b is using its referenced image 3c4d".to_string(),
        };
        assert!(err.is_image_conflict());

        let err = HarborError::Compose {
            app_id: "nextcloud".to_string(),
            command: "down".to_string(),
            stderr: "no such service: web".to_string(),
        };
        assert!(!err.is_image_conflict());
        assert!(!HarborError::Internal("conflict".to_string()).is_image_conflict());
    }

    #[test]
    fn test_broken_compose_file_detection() {
        let compose_err = |stderr: &str| HarborError::Compose {
            app_id: "gitea".to_string(),
            command: "up -d".to_string(),
            stderr: stderr.to_string(),
        };

        assert!(compose_err("yaml: line 4: did not find expected key").is_broken_compose_file());
        assert!(compose_err("open /apps/gitea/docker-compose.yml: no such file or directory")
            .is_broken_compose_file());
        assert!(compose_err("validating docker-compose.yml: services.web.ports must be a list")
            .is_broken_compose_file());
        assert!(!compose_err("Cannot connect to the Docker daemon at unix:///var/run/docker.sock")
            .is_broken_compose_file());
        assert!(!compose_err("dial unix /var/run/docker.sock: connect: no such file or directory")
            .is_broken_compose_file());
        assert!(!HarborError::Internal("yaml:".to_string()).is_broken_compose_file());
    }
}
