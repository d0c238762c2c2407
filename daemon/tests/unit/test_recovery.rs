//! Boot-time reconciliation tests

use harbord::models::app::{App, AppForm, AppStatus};
use harbord::queue::job::{AppCommand, JobPayload, JobResult, Lane};
use harbord::store::{AppPatch, Fence};
use harbord::worker::compose::ComposeCommand;

use crate::common::Harness;

async fn seed_record(harness: &Harness, app_id: &str, status: AppStatus) -> App {
    harness
        .state
        .store
        .create(App::new(app_id, status, &AppForm::default(), 2))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_recover_without_jobs() {
    let harness = Harness::new().await;
    seed_record(&harness, "a", AppStatus::Installing).await;
    seed_record(&harness, "b", AppStatus::Stopping).await;
    seed_record(&harness, "d", AppStatus::Running).await;

    let waiting = harness.lifecycle().recover().await.unwrap();
    assert!(waiting.is_empty());

    // installs that never ran are rolled back entirely
    assert!(harness.app("a").await.is_none());
    assert_eq!(harness.app("b").await.unwrap().status, AppStatus::Stopped);
    assert_eq!(harness.app("d").await.unwrap().status, AppStatus::Running);
}

#[tokio::test]
async fn test_recover_applies_journaled_result() {
    let harness = Harness::new().await;
    seed_record(&harness, "b", AppStatus::Starting).await;

    let queue = &harness.state.queue;
    let job = queue
        .enqueue(
            Lane::Immediate,
            JobPayload::app(AppCommand::Start, "b", AppForm::default()),
        )
        .await
        .unwrap();
    queue.try_lease(Lane::Immediate).await.unwrap().unwrap();
    queue.complete(job.id, JobResult::ok("App b started")).await.unwrap();

    let waiting = harness.lifecycle().recover().await.unwrap();
    assert!(waiting.is_empty());
    assert_eq!(harness.app("b").await.unwrap().status, AppStatus::Running);
}

#[tokio::test]
async fn test_recover_ignores_job_of_other_command() {
    let harness = Harness::new().await;
    seed_record(&harness, "b", AppStatus::Restarting).await;

    let queue = &harness.state.queue;
    let job = queue
        .enqueue(
            Lane::Immediate,
            JobPayload::app(AppCommand::Start, "b", AppForm::default()),
        )
        .await
        .unwrap();
    queue.try_lease(Lane::Immediate).await.unwrap().unwrap();
    queue.complete(job.id, JobResult::ok("App b started")).await.unwrap();

    harness.lifecycle().recover().await.unwrap();
    assert_eq!(harness.app("b").await.unwrap().status, AppStatus::Stopped);
}

#[tokio::test]
async fn test_recover_waits_for_queued_job() {
    let harness = Harness::new().await;
    seed_record(&harness, "b", AppStatus::Starting).await;
    harness
        .state
        .queue
        .enqueue(
            Lane::Immediate,
            JobPayload::app(AppCommand::Start, "b", AppForm::default()),
        )
        .await
        .unwrap();

    let mut waiting = harness.lifecycle().recover().await.unwrap();
    assert_eq!(waiting.len(), 1);
    assert_eq!(harness.app("b").await.unwrap().status, AppStatus::Starting);

    let _consumer = harness.spawn_consumer();
    waiting.remove(0).settled().await.unwrap();
    assert_eq!(harness.app("b").await.unwrap().status, AppStatus::Running);
    assert_eq!(harness.compose.count("b", ComposeCommand::UpForceRecreate), 1);
}

#[tokio::test]
async fn test_stale_result_is_dropped() {
    let harness = Harness::new().await;
    let record = seed_record(&harness, "b", AppStatus::Starting).await;
    harness
        .state
        .queue
        .enqueue(
            Lane::Immediate,
            JobPayload::app(AppCommand::Start, "b", AppForm::default()),
        )
        .await
        .unwrap();

    let mut waiting = harness.lifecycle().recover().await.unwrap();

    // another operation takes over the record before the job finishes
    harness
        .state
        .store
        .update(
            "b",
            Fence::Seq(record.operation_seq),
            AppPatch::begin(AppStatus::Stopping),
        )
        .await
        .unwrap()
        .unwrap();

    let _consumer = harness.spawn_consumer();
    waiting.remove(0).settled().await.unwrap();
    assert_eq!(harness.app("b").await.unwrap().status, AppStatus::Stopping);
}

#[tokio::test]
async fn test_start_all_starts_running_apps() {
    let harness = Harness::new().await;
    let _consumer = harness.spawn_consumer();
    seed_record(&harness, "b", AppStatus::Running).await;
    seed_record(&harness, "d", AppStatus::Stopped).await;

    let started = harness.lifecycle().start_all().await.unwrap();
    assert_eq!(started.len(), 1);
    for operation in started {
        assert_eq!(operation.app_id, "b");
        operation.settled().await.unwrap();
    }

    assert_eq!(harness.app("b").await.unwrap().status, AppStatus::Running);
    assert_eq!(harness.app("d").await.unwrap().status, AppStatus::Stopped);
    assert_eq!(harness.compose.count("b", ComposeCommand::UpForceRecreate), 1);
    assert_eq!(harness.compose.count("d", ComposeCommand::UpForceRecreate), 0);
    assert!(harness.layout.app_env_file("b").exists().await);
}

#[tokio::test]
async fn test_start_all_keeps_existing_env_file() {
    let harness = Harness::new().await;
    let _consumer = harness.spawn_consumer();
    seed_record(&harness, "b", AppStatus::Running).await;
    let env_file = harness.layout.app_env_file("b");
    env_file.write_string("MARKER=kept\n").await.unwrap();

    for operation in harness.lifecycle().start_all().await.unwrap() {
        operation.settled().await.unwrap();
    }

    assert_eq!(harness.app("b").await.unwrap().status, AppStatus::Running);
    assert_eq!(env_file.read_string().await.unwrap(), "MARKER=kept\n");

    harness.lifecycle().stop("b").await.unwrap().settled().await.unwrap();
    let env = harness.env_of("b").await;
    assert_eq!(env.get("APP_ID"), Some("b"));
}
