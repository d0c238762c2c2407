//! Request side of app lifecycle operations
//!
//! Every command validates synchronously, writes the transient status, enqueues
//! a job carrying the complete form and returns. A spawned task then waits for
//! the job's result and reconciles the persisted status.

pub mod fsm;
pub mod reconcile;
pub mod recovery;
pub mod validate;

mod backup;
mod config;
mod control;
mod install;
mod uninstall;
mod update;

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::apps::directory::{sanitize_app_id, AppDirectory};
use crate::errors::{HarborError, ValidationError};
use crate::lifecycle::reconcile::{Pending, Plan};
use crate::models::app::{App, AppStatus};
use crate::notify::broadcaster::{AppEvent, Broadcaster};
use crate::notify::reporter::ErrorReporter;
use crate::queue::broker::JobQueue;
use crate::queue::job::{AppCommand, AppJobArgs, JobHandle, JobPayload, Lane};
use crate::storage::settings::Settings;
use crate::store::{AppPatch, AppRepository, Fence};
use crate::worker::backup::BackupManager;

/// Platform facts and limits applied by commands
#[derive(Debug, Clone)]
pub struct LifecyclePolicy {
    pub platform_version: String,
    pub architecture: String,
    pub demo_mode: bool,

    /// Wait for a job's result before treating it as failed
    pub job_timeout: Duration,

    /// Wait granted to jobs that move whole app directories
    pub backup_timeout: Duration,
}

impl LifecyclePolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            platform_version: settings.platform_version.clone(),
            architecture: settings.architecture.clone(),
            demo_mode: settings.demo_mode,
            job_timeout: Duration::from_secs(settings.queue.default_timeout_secs),
            backup_timeout: Duration::from_secs(settings.queue.backup_timeout_secs),
        }
    }

    pub fn platform(&self) -> validate::Platform<'_> {
        validate::Platform {
            version: &self.platform_version,
            architecture: &self.architecture,
        }
    }
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Collaborators injected into every command
pub struct CommandContext {
    pub store: Arc<dyn AppRepository>,
    pub queue: Arc<JobQueue>,
    pub apps: AppDirectory,
    pub broadcaster: Arc<Broadcaster>,
    pub backups: Arc<dyn BackupManager>,
    pub reporter: Arc<dyn ErrorReporter>,
    pub policy: LifecyclePolicy,
}

/// Ticket of a started operation
#[derive(Debug)]
pub struct Operation {
    pub app_id: String,

    /// Status persisted before the command returned
    pub status: AppStatus,

    pub job: Option<JobHandle>,

    settled: Option<JoinHandle<()>>,
}

impl Operation {
    /// Wait until reconciliation, including any follow-up operation, is done
    pub async fn settled(self) -> Result<(), HarborError> {
        if let Some(handle) = self.settled {
            handle
                .await
                .map_err(|e| HarborError::Internal(format!("reconciliation task failed: {}", e)))?;
        }
        Ok(())
    }
}

/// Operation started by reconciliation after a successful job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    Start,
    Restart,
}

/// Entry point of lifecycle commands
#[derive(Clone)]
pub struct AppLifecycle {
    ctx: Arc<CommandContext>,
}

impl AppLifecycle {
    pub fn new(ctx: CommandContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    pub fn context(&self) -> &CommandContext {
        &self.ctx
    }

    pub async fn get_app(&self, app_id: &str) -> Result<Option<App>, HarborError> {
        let app_id = sanitize_app_id(app_id)?;
        Ok(self.ctx.store.get(&app_id).await?.filter(App::is_present))
    }

    pub async fn list_apps(&self) -> Result<Vec<App>, HarborError> {
        let mut apps = self.ctx.store.list().await?;
        apps.retain(App::is_present);
        Ok(apps)
    }

    /// Load a record and check the command may run against it
    async fn load(&self, command: AppCommand, app_id: &str) -> Result<App, HarborError> {
        let app_id = sanitize_app_id(app_id)?;
        let app = self.ctx.store.get(&app_id).await?;
        fsm::check_allowed(command, &app_id, app.as_ref())?;
        app.ok_or_else(|| ValidationError::AppNotFound(app_id).into())
    }

    /// Write the transient status, fenced against commands that raced past validation
    async fn begin(&self, app: &App, command: AppCommand, patch: AppPatch) -> Result<App, HarborError> {
        let patch = AppPatch {
            status: fsm::transient_status(command),
            bump_seq: true,
            ..patch
        };

        let updated = self
            .ctx
            .store
            .update(&app.id, Fence::Seq(app.operation_seq), patch)
            .await?;

        match updated {
            Some(updated) => Ok(updated),
            None => {
                let status = match self.ctx.store.get(&app.id).await? {
                    Some(current) => current.status.to_string(),
                    None => AppStatus::Missing.to_string(),
                };
                Err(ValidationError::InvalidStatus {
                    app_id: app.id.clone(),
                    operation: command.to_string(),
                    status,
                }
                .into())
            }
        }
    }

    /// Enqueue the job of an already-transitioned record and attach reconciliation
    async fn dispatch(
        &self,
        app: App,
        command: AppCommand,
        args: AppJobArgs,
        plan: Plan,
    ) -> Result<Operation, HarborError> {
        self.ctx
            .broadcaster
            .send(AppEvent::status_change(&app.id, Some(app.status)));

        let payload = JobPayload::App {
            command,
            app_id: app.id.clone(),
            form: app.form(),
            args,
        };

        let job = match self.ctx.queue.enqueue(Lane::Immediate, payload).await {
            Ok(job) => job,
            Err(e) => {
                error!("Failed to enqueue {} for {}: {}", command, app.id, e);
                let pending = Pending::unqueued(&app, command, plan);
                if let Err(settle_err) = reconcile::settle(self, &pending, false).await {
                    error!("Failed to roll back {}: {}", app.id, settle_err);
                }
                return Err(e);
            }
        };
        debug!("Enqueued {} for {} as job {}", command, app.id, job.id);

        let pending = Pending {
            app_id: app.id.clone(),
            command,
            seq: app.operation_seq,
            job: Some(job),
            plan,
        };
        let settled = tokio::spawn(reconcile::reconcile(self.clone(), pending));

        Ok(Operation {
            app_id: app.id,
            status: app.status,
            job: Some(job),
            settled: Some(settled),
        })
    }

    /// Start a follow-up operation from a reconciliation task
    pub(crate) fn follow_up(
        &self,
        follow_up: FollowUp,
        app_id: String,
    ) -> BoxFuture<'static, Result<Operation, HarborError>> {
        let lifecycle = self.clone();
        async move {
            match follow_up {
                FollowUp::Start => lifecycle.start(&app_id).await,
                FollowUp::Restart => lifecycle.restart(&app_id).await,
            }
        }
        .boxed()
    }
}
