use tracing::info;

use crate::errors::{HarborError, ValidationError};
use crate::lifecycle::reconcile::Plan;
use crate::lifecycle::{validate, AppLifecycle, FollowUp, Operation};
use crate::models::app::{AppForm, AppStatus};
use crate::queue::job::{AppCommand, AppJobArgs};
use crate::store::AppPatch;

impl AppLifecycle {
    /// Persist a new form and regenerate the environment; a running app is restarted
    pub async fn update_config(&self, app_id: &str, form: AppForm) -> Result<Operation, HarborError> {
        let ctx = self.context();
        let app = self.load(AppCommand::GenerateEnv, app_id).await?;

        let info = match ctx.apps.get_installed_app_info(&app.id).await? {
            Some(info) => info,
            None => ctx
                .apps
                .get_app_info_from_app_store(&app.id)
                .await?
                .ok_or_else(|| ValidationError::AppNotFound(app.id.clone()))?,
        };

        let apps = ctx.store.list().await?;
        validate::check_exposure(&app.id, &info, &form, &apps)?;
        validate::check_form(&info, &form)?;

        let previous = app.status;
        let patch = AppPatch {
            config: Some(form.values.clone()),
            exposed: Some(form.exposed),
            exposed_local: Some(form.exposed_local),
            open_port: Some(form.open_port),
            domain: Some(form.domain().map(str::to_string)),
            ..Default::default()
        };
        let app = self.begin(&app, AppCommand::GenerateEnv, patch).await?;
        info!("Updated config of {}", app.id);

        let plan = Plan::new(AppCommand::GenerateEnv, ctx.policy.job_timeout)
            .succeed_with(previous)
            .then((previous == AppStatus::Running).then_some(FollowUp::Restart));
        self.dispatch(app, AppCommand::GenerateEnv, AppJobArgs::default(), plan)
            .await
    }
}
