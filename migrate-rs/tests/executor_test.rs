use std::sync::Arc;
use std::time::Duration;

use migrate_rs::checkpoint::{CheckpointStore, MemoryCheckpointStore};
use migrate_rs::client::types::*;
use migrate_rs::client::{MockPlatform, ProjectClient};
use migrate_rs::executor::{RunStatus, TransferExecutor};
use migrate_rs::plan::{PlanOptions, ResourceKind};
use migrate_rs::scanner;

const SRC: &str = "proj-src";
const DST: &str = "proj-dst";

async fn platform_with_projects() -> MockPlatform {
    let platform = MockPlatform::new();
    platform.create_project(SRC).await;
    platform.create_project(DST).await;
    platform
}

fn executor(platform: &MockPlatform, store: Arc<dyn CheckpointStore>) -> Arc<TransferExecutor> {
    let source: Arc<dyn ProjectClient> = Arc::new(platform.client(SRC));
    let dest: Arc<dyn ProjectClient> = Arc::new(platform.client(DST));
    Arc::new(TransferExecutor::new(source, dest, store))
}

async fn seed_database(platform: &MockPlatform, db_id: &str, collections: usize) {
    let client = platform.client(SRC);
    client
        .create_database(&Database {
            id: db_id.to_string(),
            name: format!("Database {}", db_id),
        })
        .await
        .unwrap();
    for i in 1..=collections {
        client
            .create_collection(&Collection {
                id: format!("col-{}", i),
                database_id: db_id.to_string(),
                name: format!("Collection {}", i),
                attributes: vec![],
            })
            .await
            .unwrap();
    }
}

async fn seed_functions(platform: &MockPlatform, count: usize) {
    let client = platform.client(SRC);
    for i in 1..=count {
        client
            .create_function(&Function {
                id: format!("fn-{}", i),
                name: format!("Function {}", i),
                runtime: "node-18.0".to_string(),
                entrypoint: "index.js".to_string(),
            })
            .await
            .unwrap();
    }
}

async fn seed_users(platform: &MockPlatform, count: usize) {
    let client = platform.client(SRC);
    for i in 1..=count {
        client
            .create_user(&User {
                id: format!("u-{}", i),
                email: format!("u{}@example.com", i),
                name: format!("User {}", i),
            })
            .await
            .unwrap();
    }
}

// Source has db-A (3 enabled collections) and db-B (no collections); the
// user disables db-B. Exactly one database with 3 collections lands on the
// empty destination, and nothing ever references db-B.
#[tokio::test]
async fn disabled_database_is_fully_excluded() {
    let platform = platform_with_projects().await;
    seed_database(&platform, "db-A", 3).await;
    seed_database(&platform, "db-B", 0).await;
    platform.clear_log().await;

    let source = platform.client(SRC);
    let mut plan = scanner::scan(&source, &PlanOptions::default()).await.unwrap();
    assert!(plan.set_enabled(ResourceKind::Database, "db-B", false));

    let store = Arc::new(MemoryCheckpointStore::new());
    let exec = executor(&platform, store.clone());
    let report = exec.execute(plan, false).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.created, 4); // db-A + 3 collections

    let creations = platform.creations().await;
    assert_eq!(creations.len(), 4);
    assert!(creations.iter().all(|c| c.starts_with(DST)));
    assert!(creations.iter().all(|c| !c.contains("db-B")));
    assert_eq!(creations[0], format!("{} database:db-A", DST));

    // Disabled subtrees also leave no checkpoint entries
    let entries = store.get(SRC, DST).await.unwrap();
    assert_eq!(entries.len(), 4);
    assert!(entries.keys().all(|k| !k.contains("db-B")));
}

#[tokio::test]
async fn disabled_collection_is_skipped_without_checkpoint() {
    let platform = platform_with_projects().await;
    seed_database(&platform, "db-A", 2).await;
    platform.clear_log().await;

    let source = platform.client(SRC);
    let mut plan = scanner::scan(&source, &PlanOptions::default()).await.unwrap();
    assert!(plan.set_child_enabled(ResourceKind::Database, "db-A", "col-2", false));

    let store = Arc::new(MemoryCheckpointStore::new());
    let exec = executor(&platform, store.clone());
    let report = exec.execute(plan, false).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    let creations = platform.creations().await;
    assert!(creations.iter().any(|c| c.contains("col-1")));
    assert!(creations.iter().all(|c| !c.contains("col-2")));
    assert!(store
        .get(SRC, DST)
        .await
        .unwrap()
        .keys()
        .all(|k| !k.contains("col-2")));
}

// A run fails midway through the functions category; the resumed run skips
// the two checkpointed functions, attempts the rest, and finishes every
// later category, without a second creation call for any checkpointed node.
#[tokio::test]
async fn resume_after_failure_skips_checkpointed_nodes() {
    let platform = platform_with_projects().await;
    seed_functions(&platform, 5).await;
    seed_users(&platform, 1).await;
    platform.clear_log().await;

    let options = PlanOptions {
        include_function_code: false,
        ..PlanOptions::default()
    };
    let source = platform.client(SRC);
    let plan = scanner::scan(&source, &options).await.unwrap();

    let store = Arc::new(MemoryCheckpointStore::new());
    let exec = executor(&platform, store.clone());

    platform.fail_on("function:fn-3").await;
    let report = exec.clone().execute(plan.clone(), false).await.unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    assert!(report.error.unwrap().contains("fn-3"));
    assert_eq!(report.created, 2); // fn-1, fn-2 checkpointed before the abort
    let first_run = platform.creations().await;
    assert!(first_run.iter().all(|c| !c.contains("user:")));

    // Fix the underlying issue and resume
    platform.clear_failures().await;
    platform.clear_log().await;

    let report = exec.execute(plan, true).await.unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.skipped, 2);

    let resumed = platform.creations().await;
    assert!(resumed.iter().all(|c| !c.contains("fn-1") && !c.contains("fn-2")));
    assert_eq!(
        resumed,
        vec![
            format!("{} function:fn-3", DST),
            format!("{} function:fn-4", DST),
            format!("{} function:fn-5", DST),
            format!("{} user:u-1", DST),
        ]
    );
}

// Cancellation lands while the first user's creation is in flight (held up
// in rate-limit backoff): that node finishes, nothing after it starts, and
// the terminal status is Stopped.
#[tokio::test]
async fn cancellation_is_observed_at_node_boundaries() {
    let platform = platform_with_projects().await;
    seed_users(&platform, 5).await;
    platform.clear_log().await;

    let source = platform.client(SRC);
    let plan = scanner::scan(&source, &PlanOptions::default()).await.unwrap();

    let store = Arc::new(MemoryCheckpointStore::new());
    let exec = executor(&platform, store);

    // One throttled response keeps u-1 in flight for the backoff delay
    platform.rate_limit("user:u-1", 1).await;

    let handle = exec.start(plan, false);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(handle.status().await, RunStatus::Running);
    handle.cancel();

    let report = handle.wait().await.unwrap();
    assert_eq!(report.status, RunStatus::Stopped);
    assert_ne!(report.status, RunStatus::Completed);

    // The in-flight node completed; no later node was started
    let creations = platform.creations().await;
    assert_eq!(creations, vec![format!("{} user:u-1", DST)]);
}

#[tokio::test]
async fn checkpoints_are_scoped_to_the_project_pair() {
    let platform = platform_with_projects().await;
    platform.create_project("proj-other").await;
    seed_users(&platform, 1).await;
    platform.clear_log().await;

    let source = platform.client(SRC);
    let plan = scanner::scan(&source, &PlanOptions::default()).await.unwrap();

    let store: Arc<dyn CheckpointStore> = Arc::new(MemoryCheckpointStore::new());
    let exec = executor(&platform, store.clone());

    assert!(!exec.has_prior_checkpoint().await.unwrap());

    let report = exec.clone().execute(plan, false).await.unwrap();
    assert_eq!(report.status, RunStatus::Completed);

    assert!(exec.has_prior_checkpoint().await.unwrap());
    // A different destination keeps an independent record
    assert!(!store.has_any(SRC, "proj-other").await.unwrap());
    assert!(!store.has_any("proj-other", DST).await.unwrap());
}

// Rate-limited leaf requests are retried with backoff before counting as
// hard failures.
#[tokio::test]
async fn rate_limited_creation_is_retried() {
    let platform = platform_with_projects().await;
    seed_database(&platform, "db-A", 1).await;
    let client = platform.client(SRC);
    client
        .create_document(&Document {
            id: "doc-1".to_string(),
            collection_id: "col-1".to_string(),
            database_id: "db-A".to_string(),
            data: serde_json::json!({"n": 1}),
        })
        .await
        .unwrap();
    platform.clear_log().await;

    let plan = scanner::scan(&client, &PlanOptions::default()).await.unwrap();

    let store = Arc::new(MemoryCheckpointStore::new());
    let exec = executor(&platform, store);

    platform.rate_limit("document:db-A/col-1/doc-1", 1).await;

    let report = exec.execute(plan, false).await.unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    assert!(platform
        .creations()
        .await
        .iter()
        .any(|c| c.contains("doc-1")));
}

// A fresh (non-resumed) run never consults checkpoints and re-creates
// everything; stale entries are overwritten rather than pre-cleared.
#[tokio::test]
async fn fresh_run_ignores_existing_checkpoints() {
    let platform = platform_with_projects().await;
    seed_users(&platform, 1).await;
    platform.clear_log().await;

    let source = platform.client(SRC);
    let plan = scanner::scan(&source, &PlanOptions::default()).await.unwrap();

    let store: Arc<dyn CheckpointStore> = Arc::new(MemoryCheckpointStore::new());
    // A stale entry from some earlier run
    store.mark_complete(SRC, DST, "user:u-1", "u-1").await.unwrap();

    let exec = executor(&platform, store.clone());
    let report = exec.execute(plan, false).await.unwrap();

    // Without resume the node is re-created (the destination is empty, so
    // creation succeeds) and the entry is overwritten in place
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.created, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(store.get(SRC, DST).await.unwrap().len(), 1);
}
