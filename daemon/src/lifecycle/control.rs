use tracing::info;

use crate::errors::HarborError;
use crate::lifecycle::reconcile::Plan;
use crate::lifecycle::{AppLifecycle, Operation};
use crate::queue::job::{AppCommand, AppJobArgs};
use crate::store::AppPatch;

impl AppLifecycle {
    pub async fn start(&self, app_id: &str) -> Result<Operation, HarborError> {
        self.run_simple(AppCommand::Start, app_id, AppJobArgs::default()).await
    }

    pub async fn stop(&self, app_id: &str) -> Result<Operation, HarborError> {
        self.run_simple(AppCommand::Stop, app_id, AppJobArgs::default()).await
    }

    /// Start or stop with the environment file already on disk, when there is one
    pub(crate) async fn keeping_env(
        &self,
        command: AppCommand,
        app_id: &str,
    ) -> Result<Operation, HarborError> {
        let args = AppJobArgs {
            skip_env: true,
            ..Default::default()
        };
        self.run_simple(command, app_id, args).await
    }

    pub async fn restart(&self, app_id: &str) -> Result<Operation, HarborError> {
        self.run_simple(AppCommand::Restart, app_id, AppJobArgs::default()).await
    }

    pub async fn reset(&self, app_id: &str) -> Result<Operation, HarborError> {
        self.run_simple(AppCommand::Reset, app_id, AppJobArgs::default()).await
    }

    /// Commands whose resolution only depends on the job's outcome
    async fn run_simple(
        &self,
        command: AppCommand,
        app_id: &str,
        args: AppJobArgs,
    ) -> Result<Operation, HarborError> {
        let app = self.load(command, app_id).await?;
        let app = self.begin(&app, command, AppPatch::default()).await?;
        info!("{} {}: {}", command, app.id, app.status);

        let timeout = self.context().policy.job_timeout;
        self.dispatch(app, command, args, Plan::new(command, timeout))
            .await
    }
}
