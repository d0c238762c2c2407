//! Boot-time reconciliation of interrupted operations

use tracing::{info, warn};

use crate::errors::HarborError;
use crate::lifecycle::reconcile::{self, Pending, Plan};
use crate::lifecycle::{fsm, AppLifecycle, Operation};
use crate::models::app::AppStatus;
use crate::queue::job::{AppCommand, JobHandle, JobPayload};

impl AppLifecycle {
    /// Resolve every record left in a transient status by a previous run.
    ///
    /// Records whose job is still queued get a waiter and are returned; the
    /// others are settled from the journaled result, or as failed when the job
    /// is gone.
    pub async fn recover(&self) -> Result<Vec<Operation>, HarborError> {
        let ctx = self.context();
        let mut waiting = Vec::new();

        for app in ctx.store.list().await? {
            let Some(command) = fsm::interrupted_command(app.status) else {
                continue;
            };

            let job = ctx.queue.latest_for_app(&app.id).await.filter(|job| {
                matches!(&job.payload, JobPayload::App { command: c, .. } if *c == command)
            });
            let mut pending = Pending {
                app_id: app.id.clone(),
                command,
                seq: app.operation_seq,
                job: None,
                plan: Plan::new(command, ctx.policy.backup_timeout),
            };

            match job {
                Some(job) if !job.state.is_finished() => {
                    info!("{} of {} is still queued, waiting for it", command, app.id);
                    let handle = JobHandle {
                        id: job.id,
                        lane: job.lane,
                    };
                    pending.job = Some(handle);
                    let settled = tokio::spawn(reconcile::reconcile(self.clone(), pending));
                    waiting.push(Operation {
                        app_id: app.id,
                        status: app.status,
                        job: Some(handle),
                        settled: Some(settled),
                    });
                }
                Some(job) => {
                    let success = job.result.is_some_and(|result| result.success);
                    info!("Applying the journaled result of {} for {}", command, app.id);
                    reconcile::settle(self, &pending, success).await?;
                }
                None => {
                    warn!("{} of {} was interrupted and left no job, treating it as failed", command, app.id);
                    reconcile::settle(self, &pending, false).await?;
                }
            }
        }

        Ok(waiting)
    }

    /// Bring up every app whose status is `running`
    pub async fn start_all(&self) -> Result<Vec<Operation>, HarborError> {
        let mut started = Vec::new();
        for app in self.context().store.list().await? {
            if app.status != AppStatus::Running {
                continue;
            }
            match self.keeping_env(AppCommand::Start, &app.id).await {
                Ok(operation) => started.push(operation),
                Err(e) => warn!("Could not start {}: {}", app.id, e),
            }
        }
        info!("Starting {} apps", started.len());
        Ok(started)
    }
}
