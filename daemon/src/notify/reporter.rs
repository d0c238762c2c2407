//! Error-tracking sink

use tracing::error;

/// Receives every lifecycle failure, tagged with the app and command
pub trait ErrorReporter: Send + Sync {
    fn capture(&self, app_id: &str, command: &str, message: &str);
}

/// Emits failures as structured tracing events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn capture(&self, app_id: &str, command: &str, message: &str) {
        error!(app_id = %app_id, command = %command, "{}", message);
    }
}
