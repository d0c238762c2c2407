use std::time::Duration;

use tracing::info;

use crate::errors::{HarborError, ValidationError};
use crate::lifecycle::reconcile::Plan;
use crate::lifecycle::{validate, AppLifecycle, FollowUp, Operation};
use crate::models::app::AppStatus;
use crate::queue::job::{AppCommand, AppJobArgs};
use crate::store::AppPatch;

impl AppLifecycle {
    /// Replace the installed definition with the catalog's.
    ///
    /// The status held before the update is restored on success, and a
    /// previously running app is started again.
    pub async fn update(&self, app_id: &str, perform_backup: bool) -> Result<Operation, HarborError> {
        let ctx = self.context();
        let mut app = self.load(AppCommand::Update, app_id).await?;
        let previous = app.status;

        let info = ctx
            .apps
            .get_app_info_from_app_store(&app.id)
            .await?
            .ok_or_else(|| ValidationError::AppNotFound(app.id.clone()))?;
        validate::check_platform(&app.id, &info, &ctx.policy.platform())?;

        let mut timeout = ctx.policy.job_timeout;
        if perform_backup {
            info!("Backing up {} before updating it", app.id);
            let backup = self.backup_app(app.clone(), None).await?;
            let job = backup.job;
            backup.settled().await?;

            if let Some(job) = job {
                let result = ctx.queue.wait_for(job.id, Duration::ZERO).await?;
                if !result.success {
                    return Err(HarborError::BackupError(format!(
                        "Backup of {} failed, not updating: {}",
                        app.id, result.message
                    )));
                }
            }
            app = self.load(AppCommand::Update, &app.id).await?;
            timeout = ctx.policy.backup_timeout;
        }

        let app = self.begin(&app, AppCommand::Update, AppPatch::default()).await?;
        info!("Updating {} to revision {}", app.id, info.revision);

        let plan = Plan::new(AppCommand::Update, timeout)
            .succeed_with(previous)
            .refresh_version()
            .then((previous == AppStatus::Running).then_some(FollowUp::Start));
        self.dispatch(app, AppCommand::Update, AppJobArgs::default(), plan)
            .await
    }
}
