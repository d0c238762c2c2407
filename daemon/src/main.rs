//! Harbor daemon - Entry Point
//!
//! Installs and runs self-hosted apps from a catalog repository as docker
//! compose stacks, driven through a local HTTP API.

use std::collections::HashMap;
use std::env;

use harbord::app::options::AppOptions;
use harbord::app::run::run;
use harbord::errors::HarborError;
use harbord::logs::{init_logging, LogOptions};
use harbord::storage::layout::StorageLayout;
use harbord::storage::settings::Settings;
use harbord::utils::version_info;

use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(text) => println!("{}", text),
            Err(_) => println!("{}", version.version),
        }
        return;
    }

    let layout = match cli_args.get("root") {
        Some(root) => StorageLayout::new(root),
        None => StorageLayout::default(),
    };

    let settings = match load_settings(&layout, &cli_args).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to load settings: {e}");
            return;
        }
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level,
        json_format: settings.log_json,
        log_dir: settings
            .log_to_file
            .then(|| layout.logs_dir().path().to_path_buf()),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    // Run the daemon
    let options = AppOptions::from_settings(layout, settings);
    info!("Running Harbor daemon with options: {:?}", options);
    let result = run(options, await_shutdown_signal()).await;
    if let Err(e) = result {
        error!("Failed to run the daemon: {e}");
    }
}

/// Read `settings.json`, falling back to defaults, then apply command line overrides
async fn load_settings(
    layout: &StorageLayout,
    cli_args: &HashMap<String, String>,
) -> Result<Settings, HarborError> {
    let settings_file = layout.settings_file();
    let mut settings = if settings_file.exists().await {
        settings_file.read_json::<Settings>().await?
    } else {
        Settings::default()
    };

    if let Some(level) = cli_args.get("log-level") {
        settings.log_level = level.parse().map_err(HarborError::ConfigError)?;
    }
    if let Some(port) = cli_args.get("port") {
        settings.server.port = port
            .parse()
            .map_err(|_| HarborError::ConfigError(format!("Invalid port: {}", port)))?;
    }

    Ok(settings)
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            _ => {
                error!("Failed to install signal handlers, waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Ctrl+C received, shutting down...");
    }
}
