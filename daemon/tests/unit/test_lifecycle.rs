//! Lifecycle command tests

use harbord::errors::{HarborError, ValidationError};
use harbord::models::app::{App, AppForm, AppStatus};
use harbord::storage::settings::Settings;
use harbord::worker::compose::ComposeCommand;

use crate::common::Harness;

fn form_a() -> AppForm {
    AppForm::default().with_value("TEST_FIELD", "x")
}

fn exposed(domain: &str) -> AppForm {
    AppForm {
        exposed: true,
        domain: Some(domain.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_install_writes_env_and_runs() {
    let harness = Harness::new().await;
    let _consumer = harness.spawn_consumer();

    let operation = harness.lifecycle().install("a", form_a()).await.unwrap();
    assert_eq!(operation.status, AppStatus::Installing);
    assert!(operation.job.is_some());
    operation.settled().await.unwrap();

    let app = harness.app("a").await.unwrap();
    assert_eq!(app.status, AppStatus::Running);
    assert_eq!(app.version, 1);

    let env = harness.env_of("a").await;
    assert_eq!(env.get("TEST_FIELD"), Some("x"));
    assert_eq!(env.get("APP_ID"), Some("a"));
    assert_eq!(env.get("APP_PORT"), Some("8000"));
    assert_eq!(harness.compose.count("a", ComposeCommand::UpForceRecreate), 1);

    let config = harness.data_dir("a").file("config.txt").read_string().await.unwrap();
    assert_eq!(config, "from catalog\n");
}

#[tokio::test]
async fn test_install_missing_required_field_leaves_nothing() {
    let harness = Harness::new().await;

    let err = harness
        .lifecycle()
        .install("a", AppForm::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        HarborError::Validation(ValidationError::MissingRequiredField(ref field)) if field == "TEST_FIELD"
    ));

    assert!(harness.app("a").await.is_none());
    assert!(!harness.layout.installed_app_dir("a").exists().await);
    assert_eq!(harness.state.queue.counts().await.waiting, 0);
}

#[tokio::test]
async fn test_install_rejects_multiline_value() {
    let harness = Harness::new().await;
    let form = AppForm::default().with_value("TEST_FIELD", "x\nAPP_ID=evil\nAPP_PORT=1");

    let err = harness.lifecycle().install("a", form).await.unwrap_err();
    assert!(matches!(
        err,
        HarborError::Validation(ValidationError::InvalidFieldValue { ref field, .. }) if field == "TEST_FIELD"
    ));
    assert!(harness.app("a").await.is_none());
    assert!(!harness.layout.app_env_file("a").exists().await);
}

#[tokio::test]
async fn test_install_twice_starts_instead() {
    let harness = Harness::new().await;
    let _consumer = harness.spawn_consumer();

    let lifecycle = harness.lifecycle();
    lifecycle.install("b", AppForm::default()).await.unwrap().settled().await.unwrap();

    let operation = lifecycle.install("b", AppForm::default()).await.unwrap();
    assert_eq!(operation.status, AppStatus::Starting);
    operation.settled().await.unwrap();

    assert_eq!(harness.app("b").await.unwrap().status, AppStatus::Running);
    assert_eq!(harness.compose.count("b", ComposeCommand::UpForceRecreate), 2);
}

#[tokio::test]
async fn test_concurrent_installs_reject_the_loser() {
    let harness = Harness::new().await;
    let lifecycle = harness.lifecycle();

    let (first, second) = tokio::join!(
        lifecycle.install("b", AppForm::default()),
        lifecycle.install("b", AppForm::default())
    );
    let (winner, loser) = match (first, second) {
        (Ok(operation), Err(e)) | (Err(e), Ok(operation)) => (operation, e),
        (first, second) => panic!("expected one install to win: {first:?} / {second:?}"),
    };
    assert_eq!(winner.status, AppStatus::Installing);
    assert!(matches!(
        loser,
        HarborError::Validation(ValidationError::InvalidStatus { .. })
    ));
    assert_eq!(harness.state.queue.counts().await.waiting, 1);
}

#[tokio::test]
async fn test_install_rejects_low_platform_version() {
    let harness = Harness::new().await;

    let err = harness
        .lifecycle()
        .install("c", AppForm::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        HarborError::Validation(ValidationError::VersionTooLow { .. })
    ));

    assert!(harness.app("c").await.is_none());
    let counts = harness.state.queue.counts().await;
    assert_eq!(counts.waiting + counts.active + counts.completed + counts.failed, 0);
}

#[tokio::test]
async fn test_install_unknown_app() {
    let harness = Harness::new().await;
    let err = harness
        .lifecycle()
        .install("nope", AppForm::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        HarborError::Validation(ValidationError::AppNotFound(_))
    ));

    let err = harness
        .lifecycle()
        .install("../etc", AppForm::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        HarborError::Validation(ValidationError::InvalidAppId(_))
    ));
}

#[tokio::test]
async fn test_exposure_validation() {
    let harness = Harness::new().await;
    let _consumer = harness.spawn_consumer();
    let lifecycle = harness.lifecycle();

    let no_domain = AppForm {
        exposed: true,
        ..Default::default()
    };
    let err = lifecycle.install("b", no_domain).await.unwrap_err();
    assert!(matches!(
        err,
        HarborError::Validation(ValidationError::DomainRequired(_))
    ));

    let err = lifecycle.install("d", exposed("d.example.com")).await.unwrap_err();
    assert!(matches!(
        err,
        HarborError::Validation(ValidationError::NotExposable(_))
    ));

    lifecycle
        .install("a", exposed("apps.example.com").with_value("TEST_FIELD", "x"))
        .await
        .unwrap()
        .settled()
        .await
        .unwrap();

    let err = lifecycle.install("b", exposed("apps.example.com")).await.unwrap_err();
    match err {
        HarborError::Validation(ValidationError::DomainInUse { domain, other }) => {
            assert_eq!(domain, "apps.example.com");
            assert_eq!(other, "a");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(harness.app("b").await.is_none());

    let env = harness.env_of("a").await;
    assert_eq!(env.get("APP_DOMAIN"), Some("apps.example.com"));
    assert_eq!(env.get("APP_PROTOCOL"), Some("https"));
}

#[tokio::test]
async fn test_stop_and_start() {
    let harness = Harness::new().await;
    let _consumer = harness.spawn_consumer();
    let lifecycle = harness.lifecycle();

    lifecycle.install("b", AppForm::default()).await.unwrap().settled().await.unwrap();

    let operation = lifecycle.stop("b").await.unwrap();
    assert_eq!(operation.status, AppStatus::Stopping);
    operation.settled().await.unwrap();
    assert_eq!(harness.app("b").await.unwrap().status, AppStatus::Stopped);
    assert_eq!(harness.compose.count("b", ComposeCommand::RemoveForceStop), 1);

    lifecycle.start("b").await.unwrap().settled().await.unwrap();
    assert_eq!(harness.app("b").await.unwrap().status, AppStatus::Running);

    let err = lifecycle.start("a").await.unwrap_err();
    assert!(matches!(
        err,
        HarborError::Validation(ValidationError::AppNotFound(_))
    ));
}

#[tokio::test]
async fn test_transient_status_rejects_commands() {
    let harness = Harness::new().await;
    let lifecycle = harness.lifecycle();

    // no consumer: the install stays queued
    let operation = lifecycle.install("b", AppForm::default()).await.unwrap();
    assert_eq!(operation.status, AppStatus::Installing);

    let err = lifecycle.stop("b").await.unwrap_err();
    assert!(matches!(
        err,
        HarborError::Validation(ValidationError::InvalidStatus { .. })
    ));
    assert_eq!(harness.state.queue.counts().await.waiting, 1);

    let _consumer = harness.spawn_consumer();
    operation.settled().await.unwrap();
    assert_eq!(harness.app("b").await.unwrap().status, AppStatus::Running);
}

#[tokio::test]
async fn test_failed_install_removes_record() {
    let mut harness = Harness::new().await;
    let _consumer = harness.spawn_consumer();
    harness.compose.fail_on(ComposeCommand::UpForceRecreate);

    harness
        .lifecycle()
        .install("b", AppForm::default())
        .await
        .unwrap()
        .settled()
        .await
        .unwrap();

    assert!(harness.app("b").await.is_none());
    let events = harness.drain_events();
    assert!(events.iter().any(|e| e.event == "install_error"));
    assert!(events
        .iter()
        .any(|e| e.event == "status_change" && e.data.app_status == Some(AppStatus::Missing)));
}

#[tokio::test]
async fn test_job_timeout_counts_as_failure() {
    let mut settings = Settings::default();
    settings.queue.default_timeout_secs = 1;
    let mut harness = Harness::with_settings(settings).await;
    harness
        .state
        .store
        .create(App::new("b", AppStatus::Stopped, &AppForm::default(), 2))
        .await
        .unwrap();

    // no consumer: neither job ever produces a result
    let start = harness.lifecycle().start("b").await.unwrap();
    let install = harness.lifecycle().install("d", AppForm::default()).await.unwrap();
    start.settled().await.unwrap();
    install.settled().await.unwrap();

    assert_eq!(harness.app("b").await.unwrap().status, AppStatus::Stopped);
    assert!(harness.app("d").await.is_none());

    let events = harness.drain_events();
    let error = events
        .iter()
        .find(|e| e.event == "start_error")
        .expect("start_error event");
    assert_eq!(error.data.app_id, "b");
    assert!(error.data.error.as_deref().is_some_and(|e| e.contains("Timed out")));
    assert!(events
        .iter()
        .any(|e| e.event == "install_error" && e.data.app_id == "d"));

    let captured = harness.reporter.captured();
    assert!(captured.contains(&("b".to_string(), "start".to_string())));
    assert!(captured.contains(&("d".to_string(), "install".to_string())));
}

#[tokio::test]
async fn test_update_failure_stops_app() {
    let mut harness = Harness::new().await;
    let _consumer = harness.spawn_consumer();
    let lifecycle = harness.lifecycle().clone();

    lifecycle.install("b", AppForm::default()).await.unwrap().settled().await.unwrap();
    harness.drain_events();
    harness.compose.fail_on(ComposeCommand::Pull);

    let operation = lifecycle.update("b", false).await.unwrap();
    assert_eq!(operation.status, AppStatus::Updating);
    operation.settled().await.unwrap();

    assert_eq!(harness.app("b").await.unwrap().status, AppStatus::Stopped);
    let events = harness.drain_events();
    let error = events
        .iter()
        .find(|e| e.event == "update_error")
        .expect("update_error event");
    assert_eq!(error.data.app_id, "b");
    assert!(error.data.error.is_some());
}

#[tokio::test]
async fn test_update_runtime_failure_on_teardown_stops_app() {
    let mut harness = Harness::new().await;
    let _consumer = harness.spawn_consumer();
    let lifecycle = harness.lifecycle().clone();

    lifecycle.install("b", AppForm::default()).await.unwrap().settled().await.unwrap();
    harness.drain_events();
    harness.compose.fail_with(
        ComposeCommand::UpDetached,
        "Cannot connect to the Docker daemon at unix:///var/run/docker.sock",
    );
    harness.compose.fail_on(ComposeCommand::Down {
        volumes: false,
        remove_images: true,
    });

    lifecycle.update("b", false).await.unwrap().settled().await.unwrap();

    assert_eq!(harness.app("b").await.unwrap().status, AppStatus::Stopped);
    assert_eq!(harness.compose.count("b", ComposeCommand::Pull), 0);
    let events = harness.drain_events();
    assert!(events
        .iter()
        .any(|e| e.event == "update_error" && e.data.app_id == "b"));
}

#[tokio::test]
async fn test_update_tolerates_broken_compose_file() {
    let harness = Harness::new().await;
    let _consumer = harness.spawn_consumer();
    let lifecycle = harness.lifecycle();

    lifecycle.install("b", AppForm::default()).await.unwrap().settled().await.unwrap();
    harness.compose.fail_with(
        ComposeCommand::UpDetached,
        "yaml: line 3: mapping values are not allowed in this context",
    );

    lifecycle.update("b", false).await.unwrap().settled().await.unwrap();

    assert_eq!(harness.app("b").await.unwrap().status, AppStatus::Running);
    assert_eq!(harness.compose.count("b", ComposeCommand::Pull), 1);
}

#[tokio::test]
async fn test_update_restores_running_app() {
    let harness = Harness::new().await;
    let _consumer = harness.spawn_consumer();
    let lifecycle = harness.lifecycle();

    lifecycle.install("b", AppForm::default()).await.unwrap().settled().await.unwrap();
    assert_eq!(harness.app("b").await.unwrap().version, 2);

    harness
        .catalog_dir("b")
        .file("config.json")
        .write_string(r#"{"id": "b", "port": 8001, "exposable": true, "revision": 3}"#)
        .await
        .unwrap();
    lifecycle.update("b", false).await.unwrap().settled().await.unwrap();

    let app = harness.app("b").await.unwrap();
    assert_eq!(app.status, AppStatus::Running);
    assert_eq!(app.version, 3);
    assert_eq!(harness.compose.count("b", ComposeCommand::Pull), 1);
    // once for install, once for the start after the update
    assert_eq!(harness.compose.count("b", ComposeCommand::UpForceRecreate), 2);
}

#[tokio::test]
async fn test_reset_recopies_data_but_start_keeps_it() {
    let harness = Harness::new().await;
    let _consumer = harness.spawn_consumer();
    let lifecycle = harness.lifecycle();

    lifecycle.install("a", form_a()).await.unwrap().settled().await.unwrap();
    let config = harness.data_dir("a").file("config.txt");
    config.write_string("edited\n").await.unwrap();

    lifecycle.restart("a").await.unwrap().settled().await.unwrap();
    assert_eq!(config.read_string().await.unwrap(), "edited\n");

    let operation = lifecycle.reset("a").await.unwrap();
    assert_eq!(operation.status, AppStatus::Resetting);
    operation.settled().await.unwrap();

    assert_eq!(config.read_string().await.unwrap(), "from catalog\n");
    assert_eq!(harness.app("a").await.unwrap().status, AppStatus::Running);
    assert_eq!(harness.env_of("a").await.get("TEST_FIELD"), Some("x"));
}

#[tokio::test]
async fn test_update_config_restarts_running_app() {
    let harness = Harness::new().await;
    let _consumer = harness.spawn_consumer();
    let lifecycle = harness.lifecycle();

    lifecycle.install("a", form_a()).await.unwrap().settled().await.unwrap();

    let err = lifecycle
        .update_config("a", AppForm::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        HarborError::Validation(ValidationError::MissingRequiredField(_))
    ));

    let form = AppForm::default().with_value("TEST_FIELD", "y");
    let operation = lifecycle.update_config("a", form).await.unwrap();
    assert_eq!(operation.status, AppStatus::Running);
    operation.settled().await.unwrap();

    let app = harness.app("a").await.unwrap();
    assert_eq!(app.status, AppStatus::Running);
    assert_eq!(app.config.get("TEST_FIELD"), Some(&serde_json::json!("y")));
    assert_eq!(harness.env_of("a").await.get("TEST_FIELD"), Some("y"));
    assert_eq!(harness.compose.count("a", ComposeCommand::RemoveForceStop), 1);
}

#[tokio::test]
async fn test_uninstall_stops_then_deletes() {
    let harness = Harness::new().await;
    let _consumer = harness.spawn_consumer();
    let lifecycle = harness.lifecycle();

    lifecycle.install("a", form_a()).await.unwrap().settled().await.unwrap();

    let operation = lifecycle.uninstall("a", false).await.unwrap();
    assert_eq!(operation.status, AppStatus::Uninstalling);
    operation.settled().await.unwrap();

    assert!(harness.app("a").await.is_none());
    assert!(!harness.layout.installed_app_dir("a").exists().await);
    assert!(!harness.layout.app_data_dir("a").exists().await);
    assert_eq!(harness.compose.count("a", ComposeCommand::RemoveForceStop), 1);
    assert_eq!(
        harness.compose.count(
            "a",
            ComposeCommand::Down {
                volumes: true,
                remove_images: true
            }
        ),
        1
    );
    assert!(lifecycle.list_apps().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_uninstall_tolerates_shared_image() {
    let harness = Harness::new().await;
    let _consumer = harness.spawn_consumer();
    let lifecycle = harness.lifecycle();

    lifecycle.install("b", AppForm::default()).await.unwrap().settled().await.unwrap();
    harness.compose.fail_with(
        ComposeCommand::Down {
            volumes: true,
            remove_images: true,
        },
        "Error response from daemon: conflict: unable to remove repository reference \"traefik/whoami\" (must force) - container 9f2c is using its referenced image 1d3e",
    );

    lifecycle.uninstall("b", false).await.unwrap().settled().await.unwrap();
    assert!(harness.app("b").await.is_none());
}

#[tokio::test]
async fn test_failed_uninstall_keeps_record() {
    let harness = Harness::new().await;
    let _consumer = harness.spawn_consumer();
    let lifecycle = harness.lifecycle();

    lifecycle.install("b", AppForm::default()).await.unwrap().settled().await.unwrap();
    lifecycle.stop("b").await.unwrap().settled().await.unwrap();

    harness.compose.fail_on(ComposeCommand::Down {
        volumes: true,
        remove_images: true,
    });
    lifecycle.uninstall("b", false).await.unwrap().settled().await.unwrap();
    assert_eq!(harness.app("b").await.unwrap().status, AppStatus::Stopped);
}

#[tokio::test]
async fn test_backup_and_restore() {
    let harness = Harness::new().await;
    let _consumer = harness.spawn_consumer();
    let lifecycle = harness.lifecycle();

    lifecycle.install("a", form_a()).await.unwrap().settled().await.unwrap();
    let config = harness.data_dir("a").file("config.txt");
    config.write_string("before backup\n").await.unwrap();

    let operation = lifecycle.backup("a").await.unwrap();
    assert_eq!(operation.status, AppStatus::BackingUp);
    operation.settled().await.unwrap();
    assert_eq!(harness.app("a").await.unwrap().status, AppStatus::Running);

    let archives = lifecycle.context().backups.list_backups("a").await.unwrap();
    assert_eq!(archives.len(), 1);

    config.write_string("after backup\n").await.unwrap();

    let err = lifecycle.restore("a", "missing").await.unwrap_err();
    assert!(matches!(
        err,
        HarborError::Validation(ValidationError::InvalidFieldValue { .. })
    ));

    lifecycle.restore("a", &archives[0]).await.unwrap().settled().await.unwrap();
    assert_eq!(config.read_string().await.unwrap(), "before backup\n");
    assert_eq!(harness.app("a").await.unwrap().status, AppStatus::Running);
}
