// E2E Test 2: Resume After Failure
// The operator workflow: scan, edit the plan (rename a destination id),
// run into a failure, then resume past the checkpointed nodes.

mod e2e;

use e2e::helpers::{TestEnv, DEST_PROJECT};
use migrate_rs::client::{list_all, ProjectClient};
use migrate_rs::executor::RunStatus;
use migrate_rs::plan::PlanOptions;

#[tokio::test]
async fn test_e2e_2_resume_after_failure() {
    let env = TestEnv::new().await;
    env.seed_full_project().await;

    // Plan editing: the database gets a new identifier on the destination
    let mut plan = env.scan(&PlanOptions::default()).await;
    let database = plan
        .databases
        .iter_mut()
        .find(|n| n.source_id == "crm")
        .unwrap();
    database.target_id = "crm-eu".to_string();
    database.target_name = "CRM (EU)".to_string();

    // First run dies on the team, late in the fixed order
    env.platform.fail_on("team:sales").await;
    let executor = env.executor();
    let report = executor.clone().execute(plan.clone(), false).await.unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    assert!(report.error.unwrap().contains("sales"));

    // Everything before the failure is checkpointed and present under the
    // edited identifier
    assert!(executor.has_prior_checkpoint().await.unwrap());
    let dest = env.dest();
    let databases = list_all(|c| dest.list_databases(c)).await.unwrap();
    assert_eq!(databases.len(), 1);
    assert_eq!(databases[0].id, "crm-eu");
    let documents = list_all(|c| dest.list_documents("crm-eu", "contacts", c))
        .await
        .unwrap();
    assert_eq!(documents.len(), 4);

    // Fix the underlying issue, then resume with the same plan
    env.platform.clear_failures().await;
    env.platform.clear_log().await;

    let report = executor.execute(plan, true).await.unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    // db + 2 collections + 4 documents + bucket + file + function
    assert_eq!(report.skipped, 10);
    assert_eq!(report.created, 3);

    // The resumed run issued creations only for what was missing
    let creations = env.platform.creations().await;
    assert_eq!(
        creations,
        vec![
            format!("{} team:sales", DEST_PROJECT),
            format!("{} membership:sales/m-1", DEST_PROJECT),
            format!("{} user:alice", DEST_PROJECT),
        ]
    );
}
