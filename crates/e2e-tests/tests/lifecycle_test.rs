//! Job lifecycle E2E tests.
//!
//! Every operation must end Finished with at least one message, whether it
//! succeeded, failed, or its datastore call panicked.

use std::time::Duration;

use pretty_assertions::assert_eq;

use e2e_tests::{all_operations, TestHarness, ACTOR};
use janitor_scheduler::{DATASTORE_ERROR_MESSAGE, UNEXPECTED_ERROR_MESSAGE};
use janitor_types::{JobState, MaintenanceOperation};

#[tokio::test]
async fn test_every_operation_finishes_with_messages_on_success() {
    let harness = TestHarness::new();

    for op in all_operations(&harness.backup_dir) {
        let snap = harness.run(op.clone()).await;
        assert_eq!(snap.state, JobState::Finished, "{op}");
        assert!(!snap.failed, "{op} failed: {:?}", snap.messages);
        assert!(!snap.messages.is_empty(), "{op} produced no messages");
    }
}

#[tokio::test]
async fn test_every_operation_finishes_with_messages_when_datastore_fails() {
    let harness = TestHarness::new();
    harness.datastore.fail_on("", "connection reset by peer");

    for op in all_operations(&harness.backup_dir) {
        let snap = harness.run(op.clone()).await;
        assert_eq!(snap.state, JobState::Finished, "{op}");
        assert!(!snap.messages.is_empty(), "{op} produced no messages");

        // Per-item push failures are recovered inside the synchronizer.
        let expect_failed = op != MaintenanceOperation::SyncDefinitions;
        assert_eq!(snap.failed, expect_failed, "{op}: {:?}", snap.messages);
        assert_eq!(snap.processed, 0, "{op}");
    }
}

#[tokio::test]
async fn test_every_operation_finishes_when_datastore_panics() {
    let harness = TestHarness::new();
    harness.datastore.panic_on("");

    for op in all_operations(&harness.backup_dir) {
        let snap = harness.run(op.clone()).await;
        assert_eq!(snap.state, JobState::Finished, "{op}");
        assert!(snap.failed, "{op}");
        assert_eq!(snap.messages, vec![UNEXPECTED_ERROR_MESSAGE], "{op}");
    }
}

#[tokio::test]
async fn test_generic_failure_message_pair() {
    let harness = TestHarness::new();
    harness
        .datastore
        .fail_on("is_robot", "column \"is_robot\" does not exist");

    let snap = harness.run(MaintenanceOperation::RemoveBots).await;

    assert!(snap.failed);
    assert_eq!(
        snap.messages,
        vec![
            DATASTORE_ERROR_MESSAGE.to_string(),
            "Short info: column \"is_robot\" does not exist".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_every_message_is_audited_with_actor() {
    let harness = TestHarness::new();
    harness.datastore.set_rows("is_robot", 11);

    let snap = harness.run(MaintenanceOperation::RemoveBots).await;

    let entries = harness.audit.entries();
    assert!(entries.iter().all(|e| e.actor == ACTOR));
    assert_eq!(
        harness.audit_messages(),
        vec![
            "'remove_bots' task started".to_string(),
            "Visitors removed: 11".to_string(),
        ]
    );
    assert_eq!(snap.messages, vec!["Visitors removed: 11"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_scheduler_runs_all_operations_to_completion() {
    let harness = TestHarness::new();
    let scheduler = harness.scheduler();

    let ids: Vec<_> = all_operations(&harness.backup_dir)
        .into_iter()
        .map(|op| scheduler.submit(op).unwrap())
        .collect();

    for id in ids {
        let snap = scheduler.wait(id, Duration::from_millis(2)).await.unwrap();
        assert!(snap.is_finished());
        assert!(!snap.failed, "{}: {:?}", snap.operation, snap.messages);

        let started = snap.started_at.expect("job was started");
        let finished = snap.finished_at.expect("job was finished");
        assert!(snap.submitted_at <= started);
        assert!(started <= finished);
    }

    scheduler.shutdown().await;
}
