//! Docker Compose executor

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::apps::directory::{sanitize_app_id, COMPOSE_FILE};
use crate::errors::HarborError;
use crate::storage::layout::StorageLayout;

/// The fixed vocabulary of compose invocations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeCommand {
    /// `up --detach --force-recreate --remove-orphans --pull always`
    UpForceRecreate,
    /// `up -d`
    UpDetached,
    /// `rm --force --stop`
    RemoveForceStop,
    /// `down --remove-orphans [--volumes] [--rmi all]`
    Down { volumes: bool, remove_images: bool },
    /// `pull`
    Pull,
}

impl ComposeCommand {
    pub fn args(&self) -> Vec<&'static str> {
        match self {
            ComposeCommand::UpForceRecreate => vec![
                "up",
                "--detach",
                "--force-recreate",
                "--remove-orphans",
                "--pull",
                "always",
            ],
            ComposeCommand::UpDetached => vec!["up", "-d"],
            ComposeCommand::RemoveForceStop => vec!["rm", "--force", "--stop"],
            ComposeCommand::Down {
                volumes,
                remove_images,
            } => {
                let mut args = vec!["down", "--remove-orphans"];
                if *volumes {
                    args.push("--volumes");
                }
                if *remove_images {
                    args.extend(["--rmi", "all"]);
                }
                args
            }
            ComposeCommand::Pull => vec!["pull"],
        }
    }
}

impl std::fmt::Display for ComposeCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.args().join(" "))
    }
}

/// Runs compose sub-commands against an app's installed directory
#[async_trait]
pub trait ComposeRunner: Send + Sync {
    async fn compose(&self, app_id: &str, command: ComposeCommand) -> Result<(), HarborError>;
}

/// Invokes the container runtime's compose CLI
pub struct DockerCompose {
    layout: StorageLayout,
    binary: String,
}

impl DockerCompose {
    pub fn new(layout: StorageLayout, binary: impl Into<String>) -> Self {
        Self {
            layout,
            binary: binary.into(),
        }
    }

    fn build(&self, program: &str, app_id: &str, command: ComposeCommand) -> Command {
        let installed = self.layout.installed_app_dir(app_id);
        let env_file = self.layout.app_env_file(app_id);

        let mut cmd = Command::new(program);
        if program == "docker" {
            cmd.arg("compose");
        }
        cmd.current_dir(installed.path())
            .arg("--project-name")
            .arg(app_id)
            .arg("-f")
            .arg(installed.file(COMPOSE_FILE).path());
        if env_file.path().is_file() {
            cmd.arg("--env-file").arg(env_file.path());
        }
        cmd.args(command.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

#[async_trait]
impl ComposeRunner for DockerCompose {
    async fn compose(&self, app_id: &str, command: ComposeCommand) -> Result<(), HarborError> {
        let app_id = sanitize_app_id(app_id)?;
        debug!("Running compose {} for {}", command, app_id);

        let output = match self.build(&self.binary, &app_id, command).output().await {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && self.binary == "docker" => {
                debug!("docker not found, trying docker-compose...");
                self.build("docker-compose", &app_id, command).output().await?
            }
            Err(e) => return Err(e.into()),
        };

        if !output.status.success() {
            return Err(HarborError::Compose {
                app_id,
                command: command.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        info!("compose {} succeeded for {}", command, app_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitelisted_arguments() {
        assert_eq!(
            ComposeCommand::UpForceRecreate.to_string(),
            "up --detach --force-recreate --remove-orphans --pull always"
        );
        assert_eq!(ComposeCommand::RemoveForceStop.to_string(), "rm --force --stop");
        assert_eq!(
            ComposeCommand::Down { volumes: true, remove_images: true }.to_string(),
            "down --remove-orphans --volumes --rmi all"
        );
        assert_eq!(
            ComposeCommand::Down { volumes: true, remove_images: false }.to_string(),
            "down --remove-orphans --volumes"
        );
        assert_eq!(ComposeCommand::UpDetached.to_string(), "up -d");
    }
}
