use tracing::info;

use crate::errors::{HarborError, ValidationError};
use crate::lifecycle::reconcile::Plan;
use crate::lifecycle::{AppLifecycle, FollowUp, Operation};
use crate::models::app::{App, AppStatus};
use crate::queue::job::{AppCommand, AppJobArgs};
use crate::store::AppPatch;

impl AppLifecycle {
    /// Snapshot an app; a running app is started again afterwards
    pub async fn backup(&self, app_id: &str) -> Result<Operation, HarborError> {
        let app = self.load(AppCommand::Backup, app_id).await?;
        let resume = (app.status == AppStatus::Running).then_some(FollowUp::Start);
        self.backup_app(app, resume).await
    }

    pub(crate) async fn backup_app(
        &self,
        app: App,
        follow_up: Option<FollowUp>,
    ) -> Result<Operation, HarborError> {
        let app = self.begin(&app, AppCommand::Backup, AppPatch::default()).await?;
        info!("Backing up {}", app.id);

        let plan = Plan::new(AppCommand::Backup, self.context().policy.backup_timeout).then(follow_up);
        self.dispatch(app, AppCommand::Backup, AppJobArgs::default(), plan)
            .await
    }

    /// Replace an app's directories with a named snapshot
    pub async fn restore(&self, app_id: &str, archive: &str) -> Result<Operation, HarborError> {
        let ctx = self.context();
        let app = self.load(AppCommand::Restore, app_id).await?;

        let archives = ctx.backups.list_backups(&app.id).await?;
        if !archives.iter().any(|name| name == archive) {
            return Err(ValidationError::InvalidFieldValue {
                field: "archive".to_string(),
                reason: format!("no backup named {} for {}", archive, app.id),
            }
            .into());
        }

        let resume = (app.status == AppStatus::Running).then_some(FollowUp::Start);
        let app = self.begin(&app, AppCommand::Restore, AppPatch::default()).await?;
        info!("Restoring {} from {}", app.id, archive);

        let args = AppJobArgs {
            archive: Some(archive.to_string()),
            ..Default::default()
        };
        let plan = Plan::new(AppCommand::Restore, ctx.policy.backup_timeout)
            .refresh_version()
            .then(resume);
        self.dispatch(app, AppCommand::Restore, args, plan).await
    }
}
