//! Queue consumer loop

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::queue::broker::JobQueue;
use crate::queue::job::Lane;
use crate::worker::Worker;

/// Consumer options
#[derive(Debug, Clone)]
pub struct Options {
    pub lane: Lane,

    /// Index of this consumer within its lane, for logs
    pub index: usize,

    /// Pause after a broker error
    pub error_backoff: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            lane: Lane::Immediate,
            index: 0,
            error_backoff: Duration::from_secs(1),
        }
    }
}

/// Lease, execute and complete jobs of one lane until shutdown.
///
/// A job that has been leased always runs to completion.
pub async fn run<S, F>(
    options: &Options,
    queue: &JobQueue,
    worker: &Worker,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("{:?} consumer {} starting...", options.lane, options.index);

    loop {
        let leased = tokio::select! {
            _ = &mut shutdown_signal => {
                info!("{:?} consumer {} shutting down...", options.lane, options.index);
                return;
            }
            leased = queue.lease(options.lane) => leased,
        };

        let job = match leased {
            Ok(job) => job,
            Err(e) => {
                error!("Failed to lease a job: {}", e);
                sleep_fn(options.error_backoff).await;
                continue;
            }
        };

        debug!(
            "Consumer {} picked job {} ({}, attempt {})",
            options.index,
            job.id,
            job.payload.label(),
            job.attempts
        );
        let result = worker.handle(&job.payload).await;

        if let Err(e) = queue.complete(job.id, result).await {
            error!("Failed to record the result of job {}: {}", job.id, e);
        }
    }
}
