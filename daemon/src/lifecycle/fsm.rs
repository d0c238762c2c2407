//! Status state machine of lifecycle operations

use crate::errors::ValidationError;
use crate::models::app::{App, AppStatus};
use crate::queue::job::AppCommand;

/// What reconciliation does with the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Settle on a stable status
    Status(AppStatus),
    /// Remove the record, the app reads as `missing`
    Delete,
}

/// Terminal resolutions of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub on_success: Resolution,
    pub on_failure: Resolution,
}

impl Outcome {
    pub fn resolve(&self, success: bool) -> Resolution {
        if success {
            self.on_success
        } else {
            self.on_failure
        }
    }
}

const STOPPED: Resolution = Resolution::Status(AppStatus::Stopped);
const RUNNING: Resolution = Resolution::Status(AppStatus::Running);

/// Transient status written before the job is enqueued.
///
/// `None` for commands that keep the current status while they run.
pub fn transient_status(command: AppCommand) -> Option<AppStatus> {
    match command {
        AppCommand::Install => Some(AppStatus::Installing),
        AppCommand::Start => Some(AppStatus::Starting),
        AppCommand::Stop => Some(AppStatus::Stopping),
        AppCommand::Restart => Some(AppStatus::Restarting),
        AppCommand::Uninstall => Some(AppStatus::Uninstalling),
        AppCommand::Update => Some(AppStatus::Updating),
        AppCommand::Reset => Some(AppStatus::Resetting),
        AppCommand::Backup => Some(AppStatus::BackingUp),
        AppCommand::Restore => Some(AppStatus::Restoring),
        AppCommand::GenerateEnv => None,
    }
}

/// Default resolutions of a command.
///
/// Update, backup, restore and config changes refine the success branch with
/// the status captured before the operation started.
pub fn outcome(command: AppCommand) -> Outcome {
    match command {
        AppCommand::Install => Outcome {
            on_success: RUNNING,
            on_failure: Resolution::Delete,
        },
        AppCommand::Start | AppCommand::Restart | AppCommand::Reset => Outcome {
            on_success: RUNNING,
            on_failure: STOPPED,
        },
        AppCommand::Uninstall => Outcome {
            on_success: Resolution::Delete,
            on_failure: STOPPED,
        },
        AppCommand::Stop
        | AppCommand::Update
        | AppCommand::Backup
        | AppCommand::Restore
        | AppCommand::GenerateEnv => Outcome {
            on_success: STOPPED,
            on_failure: STOPPED,
        },
    }
}

/// Command that was in flight when a record was left in a transient status
pub fn interrupted_command(status: AppStatus) -> Option<AppCommand> {
    match status {
        AppStatus::Installing => Some(AppCommand::Install),
        AppStatus::Starting => Some(AppCommand::Start),
        AppStatus::Restarting => Some(AppCommand::Restart),
        AppStatus::Resetting => Some(AppCommand::Reset),
        AppStatus::Stopping => Some(AppCommand::Stop),
        AppStatus::Uninstalling => Some(AppCommand::Uninstall),
        AppStatus::Updating => Some(AppCommand::Update),
        AppStatus::BackingUp => Some(AppCommand::Backup),
        AppStatus::Restoring => Some(AppCommand::Restore),
        AppStatus::Missing | AppStatus::Running | AppStatus::Stopped => None,
    }
}

/// Reject commands against absent apps or apps with an operation in flight
pub fn check_allowed(command: AppCommand, app_id: &str, app: Option<&App>) -> Result<(), ValidationError> {
    let Some(app) = app.filter(|app| app.is_present()) else {
        return Err(ValidationError::AppNotFound(app_id.to_string()));
    };

    if !app.status.is_stable() {
        return Err(ValidationError::InvalidStatus {
            app_id: app_id.to_string(),
            operation: command.to_string(),
            status: app.status.to_string(),
        });
    }

    Ok(())
}
