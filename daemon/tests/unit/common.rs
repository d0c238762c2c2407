//! Shared fixtures

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use harbord::app::state::{AppState, Collaborators};
use harbord::env::map::EnvMap;
use harbord::errors::HarborError;
use harbord::filesys::dir::Dir;
use harbord::lifecycle::AppLifecycle;
use harbord::models::app::App;
use harbord::notify::broadcaster::AppEvent;
use harbord::notify::reporter::ErrorReporter;
use harbord::queue::broker::Retention;
use harbord::storage::layout::StorageLayout;
use harbord::storage::settings::Settings;
use harbord::utils::repo_id;
use harbord::worker::backup::SnapshotBackup;
use harbord::worker::compose::{ComposeCommand, ComposeRunner};
use harbord::worker::consumer;

pub const REPO_URL: &str = "https://example.com/harbor/appstore";

/// Records every invocation and fails the configured commands
#[derive(Default)]
pub struct FakeCompose {
    calls: Mutex<Vec<(String, ComposeCommand)>>,
    failing: Mutex<Vec<(ComposeCommand, String)>>,
}

impl FakeCompose {
    pub fn fail_on(&self, command: ComposeCommand) {
        self.fail_with(command, "simulated failure");
    }

    pub fn fail_with(&self, command: ComposeCommand, stderr: &str) {
        self.failing.lock().unwrap().push((command, stderr.to_string()));
    }

    pub fn calls(&self) -> Vec<(String, ComposeCommand)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, app_id: &str, command: ComposeCommand) -> usize {
        self.calls()
            .iter()
            .filter(|(id, c)| id == app_id && *c == command)
            .count()
    }
}

#[async_trait]
impl ComposeRunner for FakeCompose {
    async fn compose(&self, app_id: &str, command: ComposeCommand) -> Result<(), HarborError> {
        self.calls.lock().unwrap().push((app_id.to_string(), command));
        let failure = self
            .failing
            .lock()
            .unwrap()
            .iter()
            .find(|(c, _)| *c == command)
            .map(|(_, stderr)| stderr.clone());
        if let Some(stderr) = failure {
            return Err(HarborError::Compose {
                app_id: app_id.to_string(),
                command: command.to_string(),
                stderr,
            });
        }
        Ok(())
    }
}

/// Keeps every captured failure as `(app_id, command)`
#[derive(Default)]
pub struct RecordingReporter {
    captured: Mutex<Vec<(String, String)>>,
}

impl RecordingReporter {
    pub fn captured(&self) -> Vec<(String, String)> {
        self.captured.lock().unwrap().clone()
    }
}

impl ErrorReporter for RecordingReporter {
    fn capture(&self, app_id: &str, command: &str, _message: &str) {
        self.captured
            .lock()
            .unwrap()
            .push((app_id.to_string(), command.to_string()));
    }
}

pub struct Harness {
    _root: TempDir,
    pub layout: StorageLayout,
    pub state: AppState,
    pub compose: Arc<FakeCompose>,
    pub reporter: Arc<RecordingReporter>,
    events: broadcast::Receiver<AppEvent>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_settings(Settings::default()).await
    }

    pub async fn with_settings(mut settings: Settings) -> Self {
        let root = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(root.path());
        settings.apps_repo_url = REPO_URL.to_string();
        seed_catalog(&layout).await;

        let compose = Arc::new(FakeCompose::default());
        let reporter = Arc::new(RecordingReporter::default());
        let collaborators = Collaborators {
            compose: compose.clone(),
            backups: Arc::new(SnapshotBackup::new(layout.clone())),
            reporter: reporter.clone(),
        };
        let state =
            AppState::with_collaborators(&layout, &settings, Retention::default(), collaborators)
                .await
                .unwrap();
        let events = state.broadcaster.subscribe().unwrap();

        Self {
            _root: root,
            layout,
            state,
            compose,
            reporter,
            events,
        }
    }

    pub fn lifecycle(&self) -> &AppLifecycle {
        &self.state.lifecycle
    }

    /// Run the immediate lane consumer until the test ends
    pub fn spawn_consumer(&self) -> JoinHandle<()> {
        let queue = self.state.queue.clone();
        let worker = self.state.worker.clone();
        tokio::spawn(async move {
            consumer::run(
                &consumer::Options::default(),
                queue.as_ref(),
                worker.as_ref(),
                tokio::time::sleep,
                Box::pin(std::future::pending::<()>()),
            )
            .await;
        })
    }

    pub async fn app(&self, app_id: &str) -> Option<App> {
        self.state.store.get(app_id).await.unwrap()
    }

    pub async fn env_of(&self, app_id: &str) -> EnvMap {
        let text = self.layout.app_env_file(app_id).read_string().await.unwrap();
        EnvMap::parse(&text)
    }

    /// Definition directory of an app in the catalog checkout
    pub fn catalog_dir(&self, app_id: &str) -> Dir {
        self.layout.repo_app_dir(&repo_id(REPO_URL), app_id)
    }

    pub fn data_dir(&self, app_id: &str) -> Dir {
        self.layout.app_data_dir(app_id).subdir("data")
    }

    /// Events broadcast since the last drain
    pub fn drain_events(&mut self) -> Vec<AppEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Apps of the test catalog:
/// - `a` requires `TEST_FIELD` and ships a data directory
/// - `b` is exposable with no fields
/// - `c` requires a platform version nobody has
/// - `d` may not be exposed
async fn seed_catalog(layout: &StorageLayout) {
    let repo = repo_id(REPO_URL);
    let compose = "services:\n  web:\n    image: traefik/whoami\n";

    let apps = [
        (
            "a",
            r#"{"id": "a", "port": 8000, "exposable": true,
                "form_fields": [{"type": "text", "env_variable": "TEST_FIELD", "required": true}]}"#,
        ),
        ("b", r#"{"id": "b", "port": 8001, "exposable": true, "revision": 2}"#),
        ("c", r#"{"id": "c", "port": 8002, "min_platform_version": "999.0.0"}"#),
        ("d", r#"{"id": "d", "port": 8003}"#),
    ];

    for (app_id, config) in apps {
        let dir = layout.repo_app_dir(&repo, app_id);
        dir.file("config.json").write_string(config).await.unwrap();
        dir.file("docker-compose.yml").write_string(compose).await.unwrap();
    }

    layout
        .repo_app_dir(&repo, "a")
        .subdir("data")
        .file("config.txt")
        .write_string("from catalog\n")
        .await
        .unwrap();
}
