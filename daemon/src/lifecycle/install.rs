use tracing::info;

use crate::apps::directory::sanitize_app_id;
use crate::errors::{HarborError, ValidationError};
use crate::lifecycle::reconcile::Plan;
use crate::lifecycle::{validate, AppLifecycle, Operation};
use crate::models::app::{App, AppForm, AppStatus};
use crate::queue::job::{AppCommand, AppJobArgs};

impl AppLifecycle {
    /// Install an app from the catalog; an already installed app is started instead
    pub async fn install(&self, app_id: &str, form: AppForm) -> Result<Operation, HarborError> {
        let app_id = sanitize_app_id(app_id)?;
        let ctx = self.context();

        let info = ctx
            .apps
            .get_app_info_from_app_store(&app_id)
            .await?
            .ok_or_else(|| ValidationError::AppNotFound(app_id.clone()))?;
        validate::check_platform(&app_id, &info, &ctx.policy.platform())?;

        if ctx.store.get(&app_id).await?.is_some_and(|app| app.is_present()) {
            info!("{} is already installed, starting it instead", app_id);
            return self.start(&app_id).await;
        }

        let apps = ctx.store.list().await?;
        validate::check_exposure(&app_id, &info, &form, &apps)?;
        validate::check_demo_limit(ctx.policy.demo_mode, &apps)?;
        validate::check_form(&info, &form)?;

        let app = ctx
            .store
            .create(App::new(&app_id, AppStatus::Installing, &form, info.revision))
            .await?;
        info!("Installing {} revision {}", app_id, info.revision);

        self.dispatch(
            app,
            AppCommand::Install,
            AppJobArgs::default(),
            Plan::new(AppCommand::Install, ctx.policy.job_timeout),
        )
        .await
    }
}
