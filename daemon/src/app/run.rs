//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::AppState;
use crate::errors::HarborError;
use crate::queue::job::Lane;
use crate::server::serve::serve;
use crate::server::state::ServerState;
use crate::worker::{consumer, scheduler};

/// Run the Harbor daemon
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), HarborError> {
    info!("Initializing Harbor daemon...");

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    if let Err(e) = init(&options, shutdown_tx.clone(), &mut shutdown_manager).await {
        error!("Failed to start the daemon: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    // Shutdown
    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<Arc<AppState>, HarborError> {
    let app_state = init_app_state(options, shutdown_manager).await?;

    // Resolve interrupted operations before any consumer can pick their jobs
    let recovering = app_state.lifecycle.recover().await?;
    if !recovering.is_empty() {
        info!("{} interrupted operations are waiting on their jobs", recovering.len());
    }

    init_consumers(options, app_state.clone(), shutdown_manager, &shutdown_tx)?;

    if let Err(e) = app_state.lifecycle.start_all().await {
        error!("Failed to start apps: {}", e);
    }

    if options.enable_scheduler {
        init_scheduler(
            options.scheduler.clone(),
            app_state.clone(),
            shutdown_manager,
            shutdown_tx.subscribe(),
        )?;
    }

    if options.enable_socket_server {
        init_socket_server(
            options,
            app_state.clone(),
            shutdown_manager,
            shutdown_tx.subscribe(),
        )
        .await?;
    }

    Ok(app_state)
}

async fn init_app_state(
    options: &AppOptions,
    shutdown_manager: &mut ShutdownManager,
) -> Result<Arc<AppState>, HarborError> {
    let app_state = AppState::init(
        &options.storage.layout,
        &options.settings,
        options.storage.retention,
    )
    .await?;

    let app_state = Arc::new(app_state);
    shutdown_manager.with_app_state(app_state.clone())?;

    Ok(app_state)
}

fn spawn_consumer(
    options: consumer::Options,
    app_state: &Arc<AppState>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    let queue = app_state.queue.clone();
    let worker = app_state.worker.clone();

    tokio::spawn(async move {
        consumer::run(
            &options,
            queue.as_ref(),
            worker.as_ref(),
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    })
}

fn init_consumers(
    options: &AppOptions,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    shutdown_tx: &broadcast::Sender<()>,
) -> Result<(), HarborError> {
    info!(
        "Initializing queue consumers (immediate: 1, repeating: {})...",
        options.consumers.repeating_concurrency
    );

    // One immediate consumer serializes every lifecycle operation
    let immediate = consumer::Options {
        lane: Lane::Immediate,
        index: 0,
        error_backoff: options.consumers.error_backoff,
    };
    shutdown_manager.with_consumer_handle(spawn_consumer(
        immediate,
        &app_state,
        shutdown_tx.subscribe(),
    ));

    for index in 0..options.consumers.repeating_concurrency {
        let repeating = consumer::Options {
            lane: Lane::Repeating,
            index,
            error_backoff: options.consumers.error_backoff,
        };
        shutdown_manager.with_consumer_handle(spawn_consumer(
            repeating,
            &app_state,
            shutdown_tx.subscribe(),
        ));
    }

    Ok(())
}

fn init_scheduler(
    options: scheduler::Options,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), HarborError> {
    info!("Initializing scheduler...");

    let queue = app_state.queue.clone();

    let scheduler_handle = tokio::spawn(async move {
        scheduler::run(
            &options,
            queue.as_ref(),
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_scheduler_handle(scheduler_handle)?;
    Ok(())
}

async fn init_socket_server(
    options: &AppOptions,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), HarborError> {
    info!("Initializing local HTTP server...");

    let server_state = ServerState::new(
        app_state.lifecycle.clone(),
        app_state.queue.clone(),
        app_state.broadcaster.clone(),
    );

    let server_handle = serve(&options.server, Arc::new(server_state), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_socket_server_handle(server_handle)?;
    Ok(())
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    app_state: Option<Arc<AppState>>,
    socket_server_handle: Option<JoinHandle<Result<(), HarborError>>>,
    scheduler_handle: Option<JoinHandle<()>>,
    consumer_handles: Vec<JoinHandle<()>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            app_state: None,
            socket_server_handle: None,
            scheduler_handle: None,
            consumer_handles: Vec::new(),
        }
    }

    pub fn with_app_state(&mut self, state: Arc<AppState>) -> Result<(), HarborError> {
        if self.app_state.is_some() {
            return Err(HarborError::ShutdownError("app_state already set".to_string()));
        }
        self.app_state = Some(state);
        Ok(())
    }

    pub fn with_consumer_handle(&mut self, handle: JoinHandle<()>) {
        self.consumer_handles.push(handle);
    }

    pub fn with_scheduler_handle(&mut self, handle: JoinHandle<()>) -> Result<(), HarborError> {
        if self.scheduler_handle.is_some() {
            return Err(HarborError::ShutdownError("scheduler_handle already set".to_string()));
        }
        self.scheduler_handle = Some(handle);
        Ok(())
    }

    pub fn with_socket_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), HarborError>>,
    ) -> Result<(), HarborError> {
        if self.socket_server_handle.is_some() {
            return Err(HarborError::ShutdownError("server_handle already set".to_string()));
        }
        self.socket_server_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), HarborError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, forcing shutdown...",
                    self.lifecycle_options.max_shutdown_delay
                );
                std::process::exit(1);
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), HarborError> {
        info!("Shutting down Harbor daemon...");

        // 1. Scheduler
        if let Some(handle) = self.scheduler_handle.take() {
            handle.await.map_err(|e| HarborError::ShutdownError(e.to_string()))?;
        }

        // 2. Consumers, each finishing the job it holds
        for handle in self.consumer_handles.drain(..) {
            handle.await.map_err(|e| HarborError::ShutdownError(e.to_string()))?;
        }

        // 3. App state; closing the broadcaster ends open notification streams
        if let Some(app_state) = self.app_state.take() {
            app_state.shutdown().await?;
        }

        // 4. Socket server
        if let Some(handle) = self.socket_server_handle.take() {
            handle.await.map_err(|e| HarborError::ShutdownError(e.to_string()))??;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
