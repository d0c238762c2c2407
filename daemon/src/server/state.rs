//! Server state

use std::sync::Arc;

use crate::lifecycle::AppLifecycle;
use crate::notify::broadcaster::Broadcaster;
use crate::queue::broker::JobQueue;

/// Server state shared across handlers
pub struct ServerState {
    pub lifecycle: AppLifecycle,
    pub queue: Arc<JobQueue>,
    pub broadcaster: Arc<Broadcaster>,
}

impl ServerState {
    pub fn new(lifecycle: AppLifecycle, queue: Arc<JobQueue>, broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            lifecycle,
            queue,
            broadcaster,
        }
    }
}
