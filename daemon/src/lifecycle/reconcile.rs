//! Mapping job results back onto the persisted status

use std::time::Duration;

use tracing::{error, info, warn};

use crate::errors::HarborError;
use crate::lifecycle::fsm::{self, Outcome, Resolution};
use crate::lifecycle::{AppLifecycle, FollowUp};
use crate::models::app::{App, AppStatus};
use crate::notify::broadcaster::AppEvent;
use crate::queue::job::{AppCommand, JobHandle, JobResult};
use crate::store::{AppPatch, Fence};

/// How an operation's result is applied
#[derive(Debug, Clone)]
pub struct Plan {
    pub outcome: Outcome,

    /// Bound on the wait for the job's result
    pub timeout: Duration,

    /// Persist the installed definition's revision on success
    pub refresh_version: bool,

    /// Delete the app's backups on success
    pub remove_backups: bool,

    pub follow_up: Option<FollowUp>,
}

impl Plan {
    pub fn new(command: AppCommand, timeout: Duration) -> Self {
        Self {
            outcome: fsm::outcome(command),
            timeout,
            refresh_version: false,
            remove_backups: false,
            follow_up: None,
        }
    }

    pub fn succeed_with(mut self, status: AppStatus) -> Self {
        self.outcome.on_success = Resolution::Status(status);
        self
    }

    pub fn then(mut self, follow_up: Option<FollowUp>) -> Self {
        self.follow_up = follow_up;
        self
    }

    pub fn refresh_version(mut self) -> Self {
        self.refresh_version = true;
        self
    }

    pub fn remove_backups(mut self, remove: bool) -> Self {
        self.remove_backups = remove;
        self
    }
}

/// An operation awaiting its result
#[derive(Debug, Clone)]
pub struct Pending {
    pub app_id: String,
    pub command: AppCommand,

    /// `operation_seq` written by the transition; results only apply while it is current
    pub seq: u64,

    pub job: Option<JobHandle>,
    pub plan: Plan,
}

impl Pending {
    pub(crate) fn unqueued(app: &App, command: AppCommand, plan: Plan) -> Self {
        Self {
            app_id: app.id.clone(),
            command,
            seq: app.operation_seq,
            job: None,
            plan,
        }
    }
}

/// Wait for the job's result, settle the status and run any follow-up
pub async fn reconcile(lifecycle: AppLifecycle, pending: Pending) {
    let ctx = lifecycle.context();

    let result = match pending.job {
        Some(job) => match ctx.queue.wait_for(job.id, pending.plan.timeout).await {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    "No result for {} of {}, treating it as failed: {}",
                    pending.command, pending.app_id, e
                );
                ctx.reporter
                    .capture(&pending.app_id, pending.command.as_str(), &e.to_string());
                ctx.broadcaster
                    .send(AppEvent::error(pending.command, &pending.app_id, e.to_string()));
                JobResult::failed(e.to_string())
            }
        },
        None => JobResult::failed("No job to wait for"),
    };

    match settle(&lifecycle, &pending, result.success).await {
        Ok(true) => {}
        Ok(false) => return,
        Err(e) => {
            error!("Failed to reconcile {} of {}: {}", pending.command, pending.app_id, e);
            return;
        }
    }

    if !result.success {
        return;
    }

    if let Some(follow_up) = pending.plan.follow_up {
        match lifecycle.follow_up(follow_up, pending.app_id.clone()).await {
            Ok(operation) => {
                if let Err(e) = operation.settled().await {
                    error!("{:?} of {} did not settle: {}", follow_up, pending.app_id, e);
                }
            }
            Err(e) => warn!(
                "Could not {:?} {} after {}: {}",
                follow_up, pending.app_id, pending.command, e
            ),
        }
    }
}

/// Apply the resolution for `success`; `false` when a newer operation owns the record
pub async fn settle(
    lifecycle: &AppLifecycle,
    pending: &Pending,
    success: bool,
) -> Result<bool, HarborError> {
    let ctx = lifecycle.context();
    let fence = Fence::Seq(pending.seq);
    let resolution = pending.plan.outcome.resolve(success);

    let (applied, status) = match resolution {
        Resolution::Status(status) => {
            let mut patch = AppPatch::status(status);
            if success && pending.plan.refresh_version {
                if let Some(info) = ctx.apps.get_installed_app_info(&pending.app_id).await? {
                    patch.version = Some(info.revision);
                }
            }
            let updated = ctx.store.update(&pending.app_id, fence, patch).await?;
            (updated.is_some(), status)
        }
        Resolution::Delete => {
            let deleted = ctx.store.delete(&pending.app_id, fence).await?;
            (deleted, AppStatus::Missing)
        }
    };

    if !applied {
        info!(
            "Dropping stale result of {} for {}, a newer operation took over",
            pending.command, pending.app_id
        );
        return Ok(false);
    }

    if success && pending.plan.remove_backups {
        if let Err(e) = ctx.backups.delete_backups(&pending.app_id).await {
            warn!("Failed to delete backups of {}: {}", pending.app_id, e);
        }
    }

    info!(
        "{} of {} {}, status is now {}",
        pending.command,
        pending.app_id,
        if success { "succeeded" } else { "failed" },
        status
    );
    ctx.broadcaster
        .send(AppEvent::status_change(&pending.app_id, Some(status)));
    Ok(true)
}
