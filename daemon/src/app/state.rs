//! Application state management

use std::sync::Arc;

use tracing::info;

use crate::apps::directory::AppDirectory;
use crate::env::generator::{EnvGenerator, NetworkSettings};
use crate::errors::HarborError;
use crate::lifecycle::{AppLifecycle, CommandContext, LifecyclePolicy};
use crate::notify::broadcaster::Broadcaster;
use crate::notify::reporter::{ErrorReporter, TracingErrorReporter};
use crate::queue::broker::{JobQueue, Retention};
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;
use crate::store::file::FileAppRepository;
use crate::store::AppRepository;
use crate::worker::backup::{BackupManager, SnapshotBackup};
use crate::worker::compose::{ComposeRunner, DockerCompose};
use crate::worker::executor::AppExecutor;
use crate::worker::repo::CatalogRepo;
use crate::worker::Worker;

/// Side-effecting collaborators, replaceable in tests
pub struct Collaborators {
    pub compose: Arc<dyn ComposeRunner>,
    pub backups: Arc<dyn BackupManager>,
    pub reporter: Arc<dyn ErrorReporter>,
}

impl Collaborators {
    pub fn new(layout: &StorageLayout, settings: &Settings) -> Self {
        Self {
            compose: Arc::new(DockerCompose::new(layout.clone(), settings.compose_binary.clone())),
            backups: Arc::new(SnapshotBackup::new(layout.clone())),
            reporter: Arc::new(TracingErrorReporter),
        }
    }
}

/// Main application state
pub struct AppState {
    /// Persisted app records
    pub store: Arc<dyn AppRepository>,

    /// Durable job queue
    pub queue: Arc<JobQueue>,

    /// Client notifications
    pub broadcaster: Arc<Broadcaster>,

    /// Job handlers shared by every consumer
    pub worker: Arc<Worker>,

    /// Command layer
    pub lifecycle: AppLifecycle,
}

impl AppState {
    /// Initialize application state
    pub async fn init(
        layout: &StorageLayout,
        settings: &Settings,
        retention: Retention,
    ) -> Result<Self, HarborError> {
        let collaborators = Collaborators::new(layout, settings);
        Self::with_collaborators(layout, settings, retention, collaborators).await
    }

    pub async fn with_collaborators(
        layout: &StorageLayout,
        settings: &Settings,
        retention: Retention,
        collaborators: Collaborators,
    ) -> Result<Self, HarborError> {
        info!("Initializing application state...");
        layout.setup().await?;

        let store: Arc<dyn AppRepository> =
            Arc::new(FileAppRepository::open(layout.apps_state_file()).await?);
        let queue = Arc::new(JobQueue::open(layout.queue_dir(), retention).await?);
        let broadcaster = Arc::new(Broadcaster::new());
        let apps = AppDirectory::new(layout.clone(), &settings.apps_repo_url);

        let env = Arc::new(EnvGenerator::new(
            layout.clone(),
            NetworkSettings {
                internal_ip: settings.internal_ip.clone(),
                local_domain: settings.local_domain.clone(),
            },
        ));

        let executor = AppExecutor::new(
            apps.clone(),
            env,
            collaborators.compose,
            collaborators.backups.clone(),
            broadcaster.clone(),
            collaborators.reporter.clone(),
        );
        let worker = Arc::new(Worker::new(
            executor,
            CatalogRepo::new(layout.clone()),
            layout.system_info_file(),
        ));

        let lifecycle = AppLifecycle::new(CommandContext {
            store: store.clone(),
            queue: queue.clone(),
            apps,
            broadcaster: broadcaster.clone(),
            backups: collaborators.backups,
            reporter: collaborators.reporter,
            policy: LifecyclePolicy::from_settings(settings),
        });

        Ok(Self {
            store,
            queue,
            broadcaster,
            worker,
            lifecycle,
        })
    }

    /// Shutdown application state
    pub async fn shutdown(&self) -> Result<(), HarborError> {
        info!("Shutting down application state...");
        self.broadcaster.shutdown();
        Ok(())
    }
}
