//! Periodic maintenance jobs on the repeating lane

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::queue::broker::JobQueue;
use crate::queue::job::{JobPayload, Lane, RepoCommand, SystemCommand};

/// Scheduler options
#[derive(Debug, Clone)]
pub struct Options {
    /// Catalog repository to keep up to date
    pub repo_url: String,

    pub system_info_interval: Duration,

    pub repo_update_interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            repo_url: String::new(),
            system_info_interval: Duration::from_secs(60),
            repo_update_interval: Duration::from_secs(1800),
        }
    }
}

async fn schedule(queue: &JobQueue, payload: JobPayload) {
    let label = payload.label();
    match queue.enqueue(Lane::Repeating, payload).await {
        Ok(handle) => debug!("Scheduled {} as job {}", label, handle.id),
        Err(e) => error!("Failed to schedule {}: {}", label, e),
    }
}

/// Enqueue the boot-time clone, then system-info and repo-update jobs on their intervals
pub async fn run(
    options: &Options,
    queue: &JobQueue,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) {
    info!("Scheduler starting...");

    schedule(
        queue,
        JobPayload::Repo {
            command: RepoCommand::Clone,
            url: options.repo_url.clone(),
        },
    )
    .await;

    let mut system_info = interval_at(Instant::now(), options.system_info_interval);
    system_info.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut repo_update = interval_at(
        Instant::now() + options.repo_update_interval,
        options.repo_update_interval,
    );
    repo_update.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Scheduler shutting down...");
                return;
            }
            _ = system_info.tick() => {
                schedule(queue, JobPayload::System { command: SystemCommand::SystemInfo }).await;
            }
            _ = repo_update.tick() => {
                schedule(queue, JobPayload::Repo {
                    command: RepoCommand::Update,
                    url: options.repo_url.clone(),
                }).await;
            }
        }
    }
}
