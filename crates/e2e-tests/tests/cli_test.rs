//! CLI E2E tests: parsed commands run through the harness, and the polling
//! loop that prints job messages.

use std::time::Duration;

use clap::Parser;
use pretty_assertions::assert_eq;

use e2e_tests::TestHarness;
use janitor_daemon::{follow_job, Cli};
use janitor_scheduler::SchedulerError;
use janitor_types::{JobId, MaintenanceOperation};

#[tokio::test]
async fn test_parsed_command_runs_as_operation() {
    let harness = TestHarness::new();
    let cli = Cli::parse_from([
        "janitor",
        "clean-custom",
        "--column",
        "TrafficType",
        "--value",
        "42",
    ]);

    let snap = harness.run(cli.command.to_operation().unwrap()).await;

    assert!(!snap.failed);
    assert_eq!(
        harness.datastore.body_statements()[0],
        "DELETE FROM visits WHERE TrafficType = CAST(42 AS integer)"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_follow_job_prints_each_message_once() {
    let harness = TestHarness::new();
    harness
        .datastore
        .delay_on("INSERT INTO definitions", Duration::from_millis(3));
    let scheduler = harness.scheduler();

    let id = scheduler.submit(MaintenanceOperation::SyncDefinitions).unwrap();
    let mut printed = Vec::new();
    let snap = follow_job(&scheduler, id, Duration::from_millis(1), |m| {
        printed.push(m.to_string())
    })
    .await
    .unwrap();

    assert!(snap.is_finished());
    assert_eq!(printed, snap.messages);
    assert_eq!(printed.len(), 5);

    scheduler.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_follow_job_reports_failure() {
    let harness = TestHarness::new();
    harness.datastore.fail_on("is_robot", "disk full");
    let scheduler = harness.scheduler();

    let id = scheduler.submit(MaintenanceOperation::RemoveBots).unwrap();
    let snap = follow_job(&scheduler, id, Duration::from_millis(1), |_| {})
        .await
        .unwrap();

    assert!(snap.failed);
    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_follow_unknown_job() {
    let harness = TestHarness::new();
    let scheduler = harness.scheduler();

    let result = follow_job(&scheduler, JobId::new(), Duration::from_millis(1), |_| {}).await;

    assert!(matches!(result, Err(SchedulerError::JobNotFound(_))));
}
