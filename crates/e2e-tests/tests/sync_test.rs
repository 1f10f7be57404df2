//! Definition synchronization E2E tests.
//!
//! Uses the default template-backed pusher, so every pushed definition shows
//! up as one INSERT statement in the fake datastore.

use pretty_assertions::assert_eq;

use e2e_tests::TestHarness;
use janitor_definitions::DefinitionItem;
use janitor_scheduler::UNEXPECTED_ERROR_MESSAGE;
use janitor_types::{MaintenanceOperation, SyncFailurePolicy};

fn pushed_ids(harness: &TestHarness) -> Vec<String> {
    harness
        .datastore
        .statements()
        .iter()
        .filter_map(|s| s.split("VALUES ('").nth(1))
        .filter_map(|rest| rest.split('\'').next())
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn test_sync_reports_each_root_in_order() {
    let harness = TestHarness::new();

    let snap = harness.run(MaintenanceOperation::SyncDefinitions).await;

    assert!(!snap.failed);
    assert_eq!(
        snap.messages,
        vec![
            "Engagement Plans: 1 success, 0 failed.",
            "Campaign items: 3 success, 0 failed.",
            "MV items: 0 success, 0 failed.",
            "PageEvent items: 1 success, 0 failed.",
            "Goal items: 2 success, 0 failed.",
        ]
    );
    assert_eq!(snap.processed, 7);
    assert_eq!(
        pushed_ids(&harness),
        vec!["e1", "c1", "c2", "c3", "p1", "g1", "g2"]
    );
}

#[tokio::test]
async fn test_sync_pushes_parent_ids_and_escapes_values() {
    let harness = TestHarness::builder()
        .roots(vec![
            (
                "/marketing/engagement-plans".to_string(),
                DefinitionItem::new("e0", "Plans")
                    .with_child(DefinitionItem::new("e1", "Partner's plan").with_kind("plan")),
            ),
            ("/marketing/campaigns".to_string(), DefinitionItem::new("c0", "Campaigns")),
            ("/marketing/test-lab".to_string(), DefinitionItem::new("t0", "Test Lab")),
            (
                "/settings/analytics/page-events".to_string(),
                DefinitionItem::new("p0", "Page Events"),
            ),
            ("/marketing/goals".to_string(), DefinitionItem::new("g0", "Goals")),
        ])
        .build();

    harness.run(MaintenanceOperation::SyncDefinitions).await;

    assert_eq!(
        harness.datastore.statements(),
        vec!["INSERT INTO definitions (id, name, kind, parent_id) VALUES ('e1', 'Partner''s plan', 'plan', 'e0')"]
    );
}

#[tokio::test]
async fn test_failed_definition_skips_its_subtree() {
    let harness = TestHarness::new();
    harness
        .datastore
        .fail_on("VALUES ('c2'", "duplicate key value violates unique constraint");

    let snap = harness.run(MaintenanceOperation::SyncDefinitions).await;

    // Node failures are recovered; the job itself succeeds.
    assert!(!snap.failed);
    assert_eq!(snap.messages[1], "Campaign items: 1 success, 1 failed.");
    assert_eq!(snap.processed, 5);
    assert!(!pushed_ids(&harness).contains(&"c3".to_string()));
}

#[tokio::test]
async fn test_continue_policy_pushes_children_of_failed_definition() {
    let harness = TestHarness::builder()
        .settings(|s| s.sync_failure_policy = SyncFailurePolicy::ContinueIntoChildren)
        .build();
    harness
        .datastore
        .fail_on("VALUES ('c2'", "duplicate key value violates unique constraint");

    let snap = harness.run(MaintenanceOperation::SyncDefinitions).await;

    assert_eq!(snap.messages[1], "Campaign items: 2 success, 1 failed.");
    assert!(harness
        .datastore
        .statements()
        .iter()
        .any(|s| s.contains("VALUES ('c3', 'Beach', 'campaign', 'c2')")));
}

#[tokio::test]
async fn test_failures_in_one_root_do_not_stop_the_next() {
    let harness = TestHarness::new();
    harness.datastore.fail_on("VALUES ('e1'", "permission denied");

    let snap = harness.run(MaintenanceOperation::SyncDefinitions).await;

    assert_eq!(snap.messages[0], "Engagement Plans: 0 success, 1 failed.");
    assert_eq!(snap.messages[4], "Goal items: 2 success, 0 failed.");
    assert_eq!(snap.processed, 6);
}

#[tokio::test]
async fn test_missing_root_fails_the_job() {
    let harness = TestHarness::builder().roots(Vec::new()).build();

    let snap = harness.run(MaintenanceOperation::SyncDefinitions).await;

    assert!(snap.failed);
    assert_eq!(snap.messages, vec![UNEXPECTED_ERROR_MESSAGE]);
    assert!(harness.datastore.statements().is_empty());
}
