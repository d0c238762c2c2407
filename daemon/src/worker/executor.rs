//! App job handlers
//!
//! Every handler is idempotent: a job re-delivered after a crash converges on
//! the same on-disk and container state.

use std::sync::Arc;

use minijinja::Environment;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::apps::directory::AppDirectory;
use crate::env::generator::EnvGenerator;
use crate::errors::{HarborError, ValidationError};
use crate::lifecycle::fsm;
use crate::models::app::AppForm;
use crate::models::definition::AppInfo;
use crate::notify::broadcaster::{AppEvent, Broadcaster};
use crate::notify::reporter::ErrorReporter;
use crate::queue::job::{AppCommand, AppJobArgs, JobResult};
use crate::worker::backup::BackupManager;
use crate::worker::compose::{ComposeCommand, ComposeRunner};

/// Executes app commands against the directory, environment and container runtime
pub struct AppExecutor {
    apps: AppDirectory,
    env: Arc<EnvGenerator>,
    compose: Arc<dyn ComposeRunner>,
    backups: Arc<dyn BackupManager>,
    broadcaster: Arc<Broadcaster>,
    reporter: Arc<dyn ErrorReporter>,
}

#[derive(Serialize)]
struct ComposeContext<'a> {
    app_id: &'a str,
    #[serde(flatten)]
    form: &'a AppForm,
}

impl AppExecutor {
    pub fn new(
        apps: AppDirectory,
        env: Arc<EnvGenerator>,
        compose: Arc<dyn ComposeRunner>,
        backups: Arc<dyn BackupManager>,
        broadcaster: Arc<Broadcaster>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            apps,
            env,
            compose,
            backups,
            broadcaster,
            reporter,
        }
    }

    /// Run one command, notifying clients on entry and exit
    pub async fn execute(
        &self,
        command: AppCommand,
        app_id: &str,
        form: &AppForm,
        args: &AppJobArgs,
    ) -> JobResult {
        info!("Executing {} for {}", command, app_id);
        self.broadcaster
            .send(AppEvent::status_change(app_id, fsm::transient_status(command)));

        let outcome = match command {
            AppCommand::Install => self.install(app_id, form).await,
            AppCommand::Start => self.start(app_id, form, args.skip_env).await,
            AppCommand::Stop => self.stop(app_id, form, args.skip_env).await,
            AppCommand::Restart => self.restart(app_id, form).await,
            AppCommand::Uninstall => self.uninstall(app_id, form).await,
            AppCommand::Reset => self.reset(app_id, form).await,
            AppCommand::Update => self.update(app_id, form).await,
            AppCommand::GenerateEnv => self.generate_env(app_id, form).await,
            AppCommand::Backup => self.backup(app_id, form).await,
            AppCommand::Restore => self.restore(app_id, form, args.archive.as_deref()).await,
        };

        match outcome {
            Ok(message) => {
                info!("{} of {} succeeded: {}", command, app_id, message);
                self.broadcaster.send(AppEvent::success(command, app_id));
                JobResult::ok(message)
            }
            Err(e) => {
                let message = e.to_string();
                error!("{} of {} failed: {}", command, app_id, message);
                self.reporter.capture(app_id, command.as_str(), &message);
                self.broadcaster
                    .send(AppEvent::error(command, app_id, message.as_str()));
                JobResult::failed(message)
            }
        }
    }

    /// Materialize the installed copy and its compose file
    async fn ensure_present(&self, app_id: &str, form: &AppForm) -> Result<AppInfo, HarborError> {
        if !self.apps.is_installed(app_id).await? {
            debug!("{} is not installed, copying from the catalog", app_id);
            self.apps.copy_app_from_repo_to_installed(app_id).await?;
        }

        let info = self
            .apps
            .get_installed_app_info(app_id)
            .await?
            .ok_or_else(|| ValidationError::AppNotFound(app_id.to_string()))?;

        if let Some(template_name) = &info.compose_template {
            match self.render_compose(app_id, template_name, form).await {
                Ok(rendered) => self.apps.write_docker_compose_yml(app_id, &rendered).await?,
                Err(e) => warn!(
                    "Using the default compose file of {}, template {} failed: {}",
                    app_id, template_name, e
                ),
            }
        }

        self.apps.set_app_data_dir_permissions(app_id).await?;
        Ok(info)
    }

    async fn render_compose(
        &self,
        app_id: &str,
        template_name: &str,
        form: &AppForm,
    ) -> Result<String, HarborError> {
        let template = self
            .apps
            .read_installed_file(app_id, template_name)
            .await?
            .ok_or_else(|| HarborError::TemplateError(format!("{} not found", template_name)))?;

        let mut templates = Environment::new();
        templates.set_keep_trailing_newline(true);
        templates
            .render_str(&template, ComposeContext { app_id, form })
            .map_err(|e| HarborError::TemplateError(e.to_string()))
    }

    async fn compose(&self, app_id: &str, command: ComposeCommand) -> Result<(), HarborError> {
        self.compose.compose(app_id, command).await
    }

    /// Tear down, tolerating images still used by other apps
    async fn down_tolerant(&self, app_id: &str, command: ComposeCommand) -> Result<(), HarborError> {
        match self.compose(app_id, command).await {
            Err(e) if e.is_image_conflict() => {
                warn!("Image of {} is shared with another app, keeping it: {}", app_id, e);
                Ok(())
            }
            other => other,
        }
    }

    async fn install(&self, app_id: &str, form: &AppForm) -> Result<String, HarborError> {
        let info = self.ensure_present(app_id, form).await?;
        let env = self.env.generate(app_id, &info, form).await?;
        self.apps.copy_data_dir(app_id, &env).await?;
        self.apps.set_app_data_dir_permissions(app_id).await?;
        self.compose(app_id, ComposeCommand::UpForceRecreate).await?;
        Ok(format!("App {} installed", app_id))
    }

    async fn start(&self, app_id: &str, form: &AppForm, skip_env: bool) -> Result<String, HarborError> {
        let info = self.ensure_present(app_id, form).await?;
        if !skip_env || !self.env.has_env_file(app_id).await {
            self.env.generate(app_id, &info, form).await?;
        }
        self.compose(app_id, ComposeCommand::UpForceRecreate).await?;
        Ok(format!("App {} started", app_id))
    }

    async fn stop(&self, app_id: &str, form: &AppForm, skip_env: bool) -> Result<String, HarborError> {
        let info = self.ensure_present(app_id, form).await?;
        if !skip_env || !self.env.has_env_file(app_id).await {
            self.env.generate(app_id, &info, form).await?;
        }
        self.compose(app_id, ComposeCommand::RemoveForceStop).await?;
        Ok(format!("App {} stopped", app_id))
    }

    async fn restart(&self, app_id: &str, form: &AppForm) -> Result<String, HarborError> {
        let info = self.ensure_present(app_id, form).await?;
        self.env.generate(app_id, &info, form).await?;
        self.compose(app_id, ComposeCommand::RemoveForceStop).await?;
        self.compose(app_id, ComposeCommand::UpForceRecreate).await?;
        Ok(format!("App {} restarted", app_id))
    }

    async fn uninstall(&self, app_id: &str, form: &AppForm) -> Result<String, HarborError> {
        self.ensure_present(app_id, form).await?;
        self.down_tolerant(
            app_id,
            ComposeCommand::Down {
                volumes: true,
                remove_images: true,
            },
        )
        .await?;
        self.apps.delete_app_folder(app_id).await?;
        self.apps.delete_app_data_dir(app_id).await?;
        Ok(format!("App {} uninstalled", app_id))
    }

    async fn reset(&self, app_id: &str, form: &AppForm) -> Result<String, HarborError> {
        let info = self.ensure_present(app_id, form).await?;
        self.down_tolerant(
            app_id,
            ComposeCommand::Down {
                volumes: true,
                remove_images: false,
            },
        )
        .await?;
        self.apps.delete_app_data_dir(app_id).await?;

        let env = self.env.generate(app_id, &info, form).await?;
        self.apps.copy_data_dir(app_id, &env).await?;
        self.apps.set_app_data_dir_permissions(app_id).await?;
        self.compose(app_id, ComposeCommand::UpDetached).await?;
        Ok(format!("App {} reset", app_id))
    }

    async fn update(&self, app_id: &str, form: &AppForm) -> Result<String, HarborError> {
        self.ensure_present(app_id, form).await?;

        // the old compose file may already be broken; the runtime itself may not be
        let teardown = async {
            self.compose(app_id, ComposeCommand::UpDetached).await?;
            self.compose(
                app_id,
                ComposeCommand::Down {
                    volumes: false,
                    remove_images: true,
                },
            )
            .await
        };
        match teardown.await {
            Ok(()) => {}
            Err(e) if e.is_broken_compose_file() || e.is_image_conflict() => {
                warn!("Could not tear down the previous version of {}: {}", app_id, e);
            }
            Err(e) => return Err(e),
        }

        self.apps.delete_app_folder(app_id).await?;
        self.apps.copy_app_from_repo_to_installed(app_id).await?;
        let info = self.ensure_present(app_id, form).await?;
        self.env.generate(app_id, &info, form).await?;
        self.compose(app_id, ComposeCommand::Pull).await?;
        Ok(format!("App {} updated to revision {}", app_id, info.revision))
    }

    async fn generate_env(&self, app_id: &str, form: &AppForm) -> Result<String, HarborError> {
        let info = self.ensure_present(app_id, form).await?;
        let env = self.env.generate(app_id, &info, form).await?;
        Ok(format!("Wrote {} variables for {}", env.len(), app_id))
    }

    async fn backup(&self, app_id: &str, form: &AppForm) -> Result<String, HarborError> {
        self.ensure_present(app_id, form).await?;
        self.compose(app_id, ComposeCommand::RemoveForceStop).await?;
        let archive = self.backups.backup_app(app_id).await?;
        Ok(archive)
    }

    async fn restore(
        &self,
        app_id: &str,
        form: &AppForm,
        archive: Option<&str>,
    ) -> Result<String, HarborError> {
        let archive = archive
            .ok_or_else(|| HarborError::BackupError(format!("No archive given to restore {}", app_id)))?;
        self.ensure_present(app_id, form).await?;
        self.compose(app_id, ComposeCommand::RemoveForceStop).await?;
        self.backups.restore_app(app_id, archive).await?;
        Ok(format!("App {} restored from {}", app_id, archive))
    }
}
