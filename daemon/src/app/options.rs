//! Application configuration options

use std::time::Duration;

use crate::queue::broker::Retention;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;
use crate::worker::scheduler;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Storage configuration
    pub storage: StorageOptions,

    /// Loaded settings file, after command line overrides
    pub settings: Settings,

    /// Enable local HTTP server
    pub enable_socket_server: bool,

    /// Enable the repeating-lane scheduler
    pub enable_scheduler: bool,

    /// Server configuration
    pub server: ServerOptions,

    /// Consumer configuration
    pub consumers: ConsumerOptions,

    /// Scheduler options
    pub scheduler: scheduler::Options,
}

impl AppOptions {
    /// Derive every option from the settings file
    pub fn from_settings(layout: StorageLayout, settings: Settings) -> Self {
        Self {
            storage: StorageOptions {
                layout,
                retention: Retention {
                    completed: settings.queue.completed_retention,
                    failed: settings.queue.failed_retention,
                },
            },
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            consumers: ConsumerOptions {
                repeating_concurrency: settings.queue.repeating_concurrency,
                ..Default::default()
            },
            scheduler: scheduler::Options {
                repo_url: settings.apps_repo_url.clone(),
                system_info_interval: Duration::from_secs(settings.queue.system_info_interval_secs),
                repo_update_interval: Duration::from_secs(settings.queue.repo_update_interval_secs),
            },
            settings,
            ..Default::default()
        }
    }
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            storage: StorageOptions::default(),
            settings: Settings::default(),
            enable_socket_server: true,
            enable_scheduler: true,
            server: ServerOptions::default(),
            consumers: ConsumerOptions::default(),
            scheduler: scheduler::Options::default(),
        }
    }
}

/// Lifecycle options for the daemon
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Storage configuration options
#[derive(Debug, Clone, Default)]
pub struct StorageOptions {
    /// Storage layout paths
    pub layout: StorageLayout,

    /// Finished jobs kept in the queue journal
    pub retention: Retention,
}

/// Queue consumer options
#[derive(Debug, Clone)]
pub struct ConsumerOptions {
    /// Consumers on the repeating lane; the immediate lane always has one
    pub repeating_concurrency: usize,

    /// Pause after a broker error
    pub error_backoff: Duration,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            repeating_concurrency: 3,
            error_backoff: Duration::from_secs(1),
        }
    }
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5050,
        }
    }
}
