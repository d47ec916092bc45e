// E2E Test 3: Backup and Restore
// Packs a project into one archive, then restores it into an emptied
// project through the unchanged transfer executor.

mod e2e;

use std::sync::Arc;

use e2e::helpers::TestEnv;
use migrate_rs::archive;
use migrate_rs::checkpoint::{CheckpointStore, MemoryCheckpointStore};
use migrate_rs::client::{list_all, ProjectClient};
use migrate_rs::executor::RunStatus;
use migrate_rs::plan::PlanOptions;

#[tokio::test]
async fn test_e2e_3_backup_restore() {
    let env = TestEnv::new().await;
    env.seed_full_project().await;
    let source = env.source();

    // Backup: one artifact in the lazily-provisioned backup bucket
    let summary = archive::pack(&source, &PlanOptions::default()).await.unwrap();
    assert_eq!(summary.bucket_id, archive::BACKUP_BUCKET_ID);
    assert!(summary.size_bytes > 0);

    let listed = archive::list(&source).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, summary.file_id);

    // Restore into an emptied project (modeled as a fresh one)
    env.platform.create_project("console-restored").await;
    let restored: Arc<dyn ProjectClient> = Arc::new(env.platform.client("console-restored"));
    let checkpoints: Arc<dyn CheckpointStore> = Arc::new(MemoryCheckpointStore::new());

    let bytes = archive::fetch(&source, &summary.file_id).await.unwrap();
    let bundle = archive::unpack(&bytes).unwrap();
    let report = archive::restore(restored.clone(), bundle, checkpoints)
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.created, 13);

    // Structured data, payloads and group members all came back
    let documents = list_all(|c| restored.list_documents("crm", "contacts", c))
        .await
        .unwrap();
    assert_eq!(documents.len(), 4);

    let content = restored
        .download_file("attachments", "contract")
        .await
        .unwrap();
    assert_eq!(content, b"%PDF-1.7".to_vec());

    let code = restored
        .download_function_code("welcome-email")
        .await
        .unwrap();
    assert_eq!(code, b"module.exports = () => {};".to_vec());

    let memberships = list_all(|c| restored.list_memberships("sales", c))
        .await
        .unwrap();
    assert_eq!(memberships.len(), 1);

    let users = list_all(|c| restored.list_users(c)).await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].email, "alice@example.com");

    // The restored project does not inherit the backup bucket
    let buckets = list_all(|c| restored.list_buckets(c)).await.unwrap();
    assert!(buckets.iter().all(|b| b.id != archive::BACKUP_BUCKET_ID));
}
