//! File-journaled job broker
//!
//! Each job lives in `<queue_dir>/<job_id>.json` and is rewritten atomically on
//! every state change. Jobs found `active` when the journal is opened were
//! interrupted by a crash and go back to `waiting`, so delivery is
//! at-least-once and handlers must be idempotent.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, Mutex, Notify};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::HarborError;
use crate::filesys::dir::Dir;
use crate::queue::job::{Job, JobHandle, JobPayload, JobResult, JobState, Lane};

/// Finished jobs kept in the journal
#[derive(Debug, Clone, Copy)]
pub struct Retention {
    pub completed: usize,
    pub failed: usize,
}

impl Default for Retention {
    fn default() -> Self {
        Self {
            completed: 200,
            failed: 500,
        }
    }
}

/// Broadcast when a job finishes
#[derive(Debug, Clone)]
pub struct JobCompletion {
    pub id: Uuid,
    pub result: JobResult,
}

/// Per-state job counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounts {
    pub waiting: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Default)]
struct QueueState {
    jobs: HashMap<Uuid, Job>,
    waiting: HashMap<Lane, VecDeque<Uuid>>,
}

/// Durable two-lane job queue
pub struct JobQueue {
    dir: Dir,
    retention: Retention,
    state: Mutex<QueueState>,
    immediate_ready: Notify,
    repeating_ready: Notify,
    completions: broadcast::Sender<JobCompletion>,
}

impl JobQueue {
    /// Open the journal, re-queueing jobs interrupted mid-execution
    pub async fn open(dir: Dir, retention: Retention) -> Result<Self, HarborError> {
        dir.create().await?;

        let mut jobs = Vec::new();
        let mut entries = tokio::fs::read_dir(dir.path()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let file = crate::filesys::file::File::new(&path);
            match file.read_json::<Job>().await {
                Ok(job) => jobs.push(job),
                Err(e) => warn!("Skipping unreadable job {}: {}", path.display(), e),
            }
        }
        jobs.sort_by_key(|job| job.created_at);

        let queue = Self {
            dir,
            retention,
            state: Mutex::new(QueueState::default()),
            immediate_ready: Notify::new(),
            repeating_ready: Notify::new(),
            completions: broadcast::channel(256).0,
        };

        let mut requeued = 0;
        {
            let mut state = queue.state.lock().await;
            for mut job in jobs {
                if job.state == JobState::Active {
                    job.state = JobState::Waiting;
                    job.started_at = None;
                    queue.persist(&job).await?;
                    requeued += 1;
                }
                if job.state == JobState::Waiting {
                    state.waiting.entry(job.lane).or_default().push_back(job.id);
                }
                state.jobs.insert(job.id, job);
            }
            info!(
                "Opened job queue with {} jobs ({} interrupted jobs re-queued)",
                state.jobs.len(),
                requeued
            );
        }

        Ok(queue)
    }

    fn ready(&self, lane: Lane) -> &Notify {
        match lane {
            Lane::Immediate => &self.immediate_ready,
            Lane::Repeating => &self.repeating_ready,
        }
    }

    async fn persist(&self, job: &Job) -> Result<(), HarborError> {
        self.dir
            .file(&format!("{}.json", job.id))
            .write_json(job)
            .await
    }

    /// Persist a new job and wake a consumer of its lane
    pub async fn enqueue(&self, lane: Lane, payload: JobPayload) -> Result<JobHandle, HarborError> {
        let job = Job {
            id: Uuid::new_v4(),
            lane,
            payload,
            state: JobState::Waiting,
            result: None,
            attempts: 0,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        };
        let handle = JobHandle { id: job.id, lane };

        {
            let mut state = self.state.lock().await;
            self.persist(&job).await?;
            debug!("Enqueued job {} ({})", job.id, job.payload.label());
            state.waiting.entry(lane).or_default().push_back(job.id);
            state.jobs.insert(job.id, job);
        }

        self.ready(lane).notify_one();
        Ok(handle)
    }

    /// Take the oldest waiting job of a lane, if any
    pub async fn try_lease(&self, lane: Lane) -> Result<Option<Job>, HarborError> {
        let mut state = self.state.lock().await;
        let Some(id) = state.waiting.get_mut(&lane).and_then(VecDeque::pop_front) else {
            return Ok(None);
        };
        let Some(mut job) = state.jobs.get(&id).cloned() else {
            return Ok(None);
        };

        job.state = JobState::Active;
        job.started_at = Some(Utc::now());
        job.attempts += 1;
        self.persist(&job).await?;
        state.jobs.insert(id, job.clone());
        Ok(Some(job))
    }

    /// Wait for the next job of a lane
    pub async fn lease(&self, lane: Lane) -> Result<Job, HarborError> {
        loop {
            let notified = self.ready(lane).notified();
            if let Some(job) = self.try_lease(lane).await? {
                return Ok(job);
            }
            notified.await;
        }
    }

    /// Record a job's outcome and publish it to waiters
    pub async fn complete(&self, id: Uuid, result: JobResult) -> Result<(), HarborError> {
        {
            let mut state = self.state.lock().await;
            let Some(job) = state.jobs.get_mut(&id) else {
                return Err(HarborError::QueueError(format!("Unknown job {}", id)));
            };
            job.state = if result.success {
                JobState::Completed
            } else {
                JobState::Failed
            };
            job.result = Some(result.clone());
            job.finished_at = Some(Utc::now());
            let job = job.clone();
            self.persist(&job).await?;
            self.prune(&mut state).await;
        }

        // no receivers is fine
        let _ = self.completions.send(JobCompletion { id, result });
        Ok(())
    }

    async fn prune(&self, state: &mut QueueState) {
        for (finished_state, keep) in [
            (JobState::Completed, self.retention.completed),
            (JobState::Failed, self.retention.failed),
        ] {
            let mut finished: Vec<_> = state
                .jobs
                .values()
                .filter(|job| job.state == finished_state)
                .map(|job| (job.finished_at, job.id))
                .collect();
            if finished.len() <= keep {
                continue;
            }
            finished.sort();
            let excess = finished.len() - keep;
            for (_, id) in finished.into_iter().take(excess) {
                state.jobs.remove(&id);
                if let Err(e) = self.dir.file(&format!("{}.json", id)).delete().await {
                    warn!("Failed to purge job {}: {}", id, e);
                }
            }
        }
    }

    /// Wait for a job's result for at most `timeout`
    pub async fn wait_for(&self, id: Uuid, timeout: Duration) -> Result<JobResult, HarborError> {
        let mut rx = self.completions.subscribe();

        if let Some(result) = self.finished_result(id).await? {
            return Ok(result);
        }

        let wait = async {
            loop {
                match rx.recv().await {
                    Ok(completion) if completion.id == id => return Ok(completion.result),
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Completion waiter lagged by {} events", skipped);
                        if let Some(result) = self.finished_result(id).await? {
                            return Ok(result);
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(HarborError::QueueError("Job queue closed".to_string()));
                    }
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| HarborError::Timeout(timeout, id))?
    }

    async fn finished_result(&self, id: Uuid) -> Result<Option<JobResult>, HarborError> {
        let state = self.state.lock().await;
        match state.jobs.get(&id) {
            None => Err(HarborError::QueueError(format!("Unknown job {}", id))),
            Some(job) if job.state.is_finished() => Ok(Some(
                job.result
                    .clone()
                    .unwrap_or_else(|| JobResult::failed("Job finished without a result")),
            )),
            Some(_) => Ok(None),
        }
    }

    pub async fn get(&self, id: Uuid) -> Option<Job> {
        self.state.lock().await.jobs.get(&id).cloned()
    }

    /// Most recently created job targeting an app
    pub async fn latest_for_app(&self, app_id: &str) -> Option<Job> {
        self.state
            .lock()
            .await
            .jobs
            .values()
            .filter(|job| job.payload.app_id() == Some(app_id))
            .max_by_key(|job| job.created_at)
            .cloned()
    }

    pub async fn counts(&self) -> JobCounts {
        let state = self.state.lock().await;
        let mut counts = JobCounts::default();
        for job in state.jobs.values() {
            match job.state {
                JobState::Waiting => counts.waiting += 1,
                JobState::Active => counts.active += 1,
                JobState::Completed => counts.completed += 1,
                JobState::Failed => counts.failed += 1,
            }
        }
        counts
    }
}
