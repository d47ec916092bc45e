use std::sync::Arc;

use migrate_rs::checkpoint::{CheckpointStore, MemoryCheckpointStore};
use migrate_rs::client::types::*;
use migrate_rs::client::{MockPlatform, MockProjectClient, ProjectClient};
use migrate_rs::executor::TransferExecutor;
use migrate_rs::plan::{MigrationPlan, PlanOptions};
use migrate_rs::scanner;

pub const SOURCE_PROJECT: &str = "console-src";
pub const DEST_PROJECT: &str = "console-dst";

/// Test environment: one mock platform hosting both projects
pub struct TestEnv {
    pub platform: MockPlatform,
    pub checkpoints: Arc<MemoryCheckpointStore>,
}

impl TestEnv {
    pub async fn new() -> Self {
        let platform = MockPlatform::new();
        platform.create_project(SOURCE_PROJECT).await;
        platform.create_project(DEST_PROJECT).await;
        Self {
            platform,
            checkpoints: Arc::new(MemoryCheckpointStore::new()),
        }
    }

    pub fn source(&self) -> MockProjectClient {
        self.platform.client(SOURCE_PROJECT)
    }

    pub fn dest(&self) -> MockProjectClient {
        self.platform.client(DEST_PROJECT)
    }

    pub fn executor(&self) -> Arc<TransferExecutor> {
        let source: Arc<dyn ProjectClient> = Arc::new(self.source());
        let dest: Arc<dyn ProjectClient> = Arc::new(self.dest());
        let checkpoints: Arc<dyn CheckpointStore> = self.checkpoints.clone();
        Arc::new(TransferExecutor::new(source, dest, checkpoints))
    }

    pub async fn scan(&self, options: &PlanOptions) -> MigrationPlan {
        scanner::scan(&self.source(), options)
            .await
            .expect("scan failed")
    }

    /// Populate the source project with one of everything, sized to cross
    /// the mock's page size where it matters
    pub async fn seed_full_project(&self) {
        let client = self.source();

        client
            .create_database(&Database {
                id: "crm".to_string(),
                name: "CRM".to_string(),
            })
            .await
            .unwrap();
        for (id, name) in [("contacts", "Contacts"), ("deals", "Deals")] {
            client
                .create_collection(&Collection {
                    id: id.to_string(),
                    database_id: "crm".to_string(),
                    name: name.to_string(),
                    attributes: vec![serde_json::json!({"key": "name", "type": "string"})],
                })
                .await
                .unwrap();
        }
        for i in 1..=4 {
            client
                .create_document(&Document {
                    id: format!("contact-{}", i),
                    collection_id: "contacts".to_string(),
                    database_id: "crm".to_string(),
                    data: serde_json::json!({"name": format!("Contact {}", i)}),
                })
                .await
                .unwrap();
        }

        client
            .create_bucket(&Bucket {
                id: "attachments".to_string(),
                name: "Attachments".to_string(),
                permissions: vec!["read(\"team:sales\")".to_string()],
            })
            .await
            .unwrap();
        client
            .upload_file(
                &FileEntry {
                    id: "contract".to_string(),
                    bucket_id: "attachments".to_string(),
                    name: "contract.pdf".to_string(),
                    size: 8,
                },
                b"%PDF-1.7".to_vec(),
            )
            .await
            .unwrap();

        client
            .create_function(&Function {
                id: "welcome-email".to_string(),
                name: "Welcome email".to_string(),
                runtime: "node-18.0".to_string(),
                entrypoint: "index.js".to_string(),
            })
            .await
            .unwrap();
        client
            .deploy_function_code("welcome-email", b"module.exports = () => {};".to_vec())
            .await
            .unwrap();

        client
            .create_team(&Team {
                id: "sales".to_string(),
                name: "Sales".to_string(),
            })
            .await
            .unwrap();
        client
            .create_membership(&Membership {
                id: "m-1".to_string(),
                team_id: "sales".to_string(),
                user_id: "alice".to_string(),
                roles: vec!["owner".to_string()],
            })
            .await
            .unwrap();

        client
            .create_user(&User {
                id: "alice".to_string(),
                email: "alice@example.com".to_string(),
                name: "Alice".to_string(),
            })
            .await
            .unwrap();

        self.platform.clear_log().await;
    }

    /// Kind prefix of every creation recorded against the destination, in
    /// order
    pub async fn destination_creation_kinds(&self) -> Vec<String> {
        self.platform
            .creations()
            .await
            .iter()
            .filter_map(|entry| {
                entry
                    .strip_prefix(&format!("{} ", DEST_PROJECT))
                    .and_then(|key| key.split(':').next())
                    .map(|kind| kind.to_string())
            })
            .collect()
    }
}
