// E2E Test 1: Full Migration
// Scans a populated source project and executes the unedited plan against
// an empty destination, verifying content and the fixed execution order.

mod e2e;

use e2e::helpers::TestEnv;
use migrate_rs::client::{list_all, ProjectClient};
use migrate_rs::executor::RunStatus;
use migrate_rs::plan::PlanOptions;

#[tokio::test]
async fn test_e2e_1_full_migration() {
    let env = TestEnv::new().await;
    env.seed_full_project().await;

    let plan = env.scan(&PlanOptions::default()).await;
    assert_eq!(plan.enabled_top_level(), plan.total_top_level());

    let report = env.executor().execute(plan, false).await.unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.skipped, 0);
    // db + 2 collections + 4 documents + bucket + file + function + team +
    // membership + user
    assert_eq!(report.created, 13);

    // Categories land in the fixed dependency order
    let kinds = env.destination_creation_kinds().await;
    assert_eq!(
        kinds,
        vec![
            "database",
            "collection",
            "document",
            "document",
            "document",
            "document",
            "collection",
            "bucket",
            "file",
            "function",
            "team",
            "membership",
            "user",
        ]
    );

    // Structured content arrived intact
    let dest = env.dest();
    let documents = list_all(|c| dest.list_documents("crm", "contacts", c))
        .await
        .unwrap();
    assert_eq!(documents.len(), 4);
    assert!(documents
        .iter()
        .any(|d| d.data["name"] == "Contact 1"));

    // Binary payloads arrived intact
    let content = dest.download_file("attachments", "contract").await.unwrap();
    assert_eq!(content, b"%PDF-1.7".to_vec());
    let code = dest.download_function_code("welcome-email").await.unwrap();
    assert_eq!(code, b"module.exports = () => {};".to_vec());

    // Memberships kept their roles
    let memberships = list_all(|c| dest.list_memberships("sales", c)).await.unwrap();
    assert_eq!(memberships.len(), 1);
    assert_eq!(memberships[0].user_id, "alice");
    assert_eq!(memberships[0].roles, vec!["owner".to_string()]);
}
