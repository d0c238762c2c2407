//! Execution side of the job queue

pub mod backup;
pub mod compose;
pub mod consumer;
pub mod executor;
pub mod repo;
pub mod scheduler;
pub mod system;

use tracing::error;

use crate::filesys::file::File;
use crate::queue::job::{JobPayload, JobResult, RepoCommand, SystemCommand};
use crate::worker::executor::AppExecutor;
use crate::worker::repo::CatalogRepo;

/// Dispatches dequeued jobs by `(type, command)` to their handler
pub struct Worker {
    executor: AppExecutor,
    repo: CatalogRepo,
    system_info_file: File,
}

impl Worker {
    pub fn new(executor: AppExecutor, repo: CatalogRepo, system_info_file: File) -> Self {
        Self {
            executor,
            repo,
            system_info_file,
        }
    }

    pub async fn handle(&self, payload: &JobPayload) -> JobResult {
        match payload {
            JobPayload::App {
                command,
                app_id,
                form,
                args,
            } => self.executor.execute(*command, app_id, form, args).await,
            JobPayload::Repo { command, url } => {
                let outcome = match command {
                    RepoCommand::Clone => self.repo.clone_repo(url).await,
                    RepoCommand::Update => self.repo.update_repo(url).await,
                };
                into_result(payload, outcome)
            }
            JobPayload::System {
                command: SystemCommand::SystemInfo,
            } => into_result(
                payload,
                system::refresh_system_info(&self.system_info_file).await,
            ),
        }
    }
}

fn into_result(payload: &JobPayload, outcome: Result<String, crate::errors::HarborError>) -> JobResult {
    match outcome {
        Ok(message) => JobResult::ok(message),
        Err(e) => {
            error!("{} failed: {}", payload.label(), e);
            JobResult::failed(e.to_string())
        }
    }
}
