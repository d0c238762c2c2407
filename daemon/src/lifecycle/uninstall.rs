use tracing::info;

use crate::errors::HarborError;
use crate::lifecycle::reconcile::Plan;
use crate::lifecycle::{AppLifecycle, Operation};
use crate::models::app::AppStatus;
use crate::queue::job::{AppCommand, AppJobArgs};
use crate::store::AppPatch;

impl AppLifecycle {
    /// Tear down and delete an app; a running app is stopped first
    pub async fn uninstall(&self, app_id: &str, remove_backups: bool) -> Result<Operation, HarborError> {
        let mut app = self.load(AppCommand::Uninstall, app_id).await?;

        if app.status == AppStatus::Running {
            info!("Stopping {} before uninstalling it", app.id);
            // the environment file is deleted with the app
            self.keeping_env(AppCommand::Stop, &app.id).await?.settled().await?;
            app = self.load(AppCommand::Uninstall, &app.id).await?;
        }

        let app = self
            .begin(&app, AppCommand::Uninstall, AppPatch::default())
            .await?;
        info!("Uninstalling {}", app.id);

        let plan = Plan::new(AppCommand::Uninstall, self.context().policy.job_timeout)
            .remove_backups(remove_backups);
        self.dispatch(app, AppCommand::Uninstall, AppJobArgs::default(), plan)
            .await
    }
}
