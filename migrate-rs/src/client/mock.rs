//! In-memory mock platform for testing
//!
//! Holds any number of projects in one shared state, records every
//! successful creation in an ordered log, and supports injected failures and
//! rate-limit responses keyed by node key. Function executions simulate the
//! proxy worker by performing the requested transfer directly between the
//! mock projects.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::{MigrateError, Result};
use crate::plan::{node_key, ResourceKind};
use crate::proxy::TransferTask;

use super::types::*;
use super::ProjectClient;

/// Page size served by mock list calls; deliberately small so multi-page
/// listings are exercised by ordinary tests
const PAGE_SIZE: usize = 3;

#[derive(Default)]
struct ProjectState {
    databases: Vec<Database>,
    collections: HashMap<String, Vec<Collection>>,
    documents: HashMap<(String, String), Vec<Document>>,
    buckets: Vec<Bucket>,
    files: HashMap<String, Vec<FileEntry>>,
    file_contents: HashMap<(String, String), Vec<u8>>,
    functions: Vec<Function>,
    function_code: HashMap<String, Vec<u8>>,
    teams: Vec<Team>,
    memberships: HashMap<String, Vec<Membership>>,
    users: Vec<User>,
    executions: HashMap<String, Execution>,
}

#[derive(Default)]
struct PlatformState {
    projects: HashMap<String, ProjectState>,
    /// Successful creations, in order, as "<project> <node key>"
    call_log: Vec<String>,
    fail_on: HashSet<String>,
    rate_limit_on: HashMap<String, u32>,
}

/// Shared mock platform
#[derive(Clone, Default)]
pub struct MockPlatform {
    state: Arc<RwLock<PlatformState>>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an empty project
    pub async fn create_project(&self, project_id: &str) {
        self.state
            .write()
            .await
            .projects
            .entry(project_id.to_string())
            .or_default();
    }

    /// Client bound to one of the platform's projects
    pub fn client(&self, project_id: &str) -> MockProjectClient {
        MockProjectClient {
            platform: self.clone(),
            project_id: project_id.to_string(),
        }
    }

    /// Make every write matching this node key fail until cleared
    pub async fn fail_on(&self, key: &str) {
        self.state.write().await.fail_on.insert(key.to_string());
    }

    /// Clear injected failures (the "underlying issue is fixed" step)
    pub async fn clear_failures(&self) {
        self.state.write().await.fail_on.clear();
    }

    /// Answer the next `times` writes matching this node key with a
    /// rate-limited response
    pub async fn rate_limit(&self, key: &str, times: u32) {
        self.state
            .write()
            .await
            .rate_limit_on
            .insert(key.to_string(), times);
    }

    /// Successful creations in order, formatted "<project> <node key>"
    pub async fn creations(&self) -> Vec<String> {
        self.state.read().await.call_log.clone()
    }

    /// Forget recorded creations (used after seeding test fixtures)
    pub async fn clear_log(&self) {
        self.state.write().await.call_log.clear();
    }
}

/// Client view over one mock project
#[derive(Clone)]
pub struct MockProjectClient {
    platform: MockPlatform,
    project_id: String,
}

fn page_of<T: Clone>(items: &[T], cursor: Option<String>) -> ListPage<T> {
    let start = cursor.and_then(|c| c.parse::<usize>().ok()).unwrap_or(0);
    let end = (start + PAGE_SIZE).min(items.len());
    let next = if end < items.len() {
        Some(end.to_string())
    } else {
        None
    };
    ListPage::new(items[start..end].to_vec(), next)
}

impl MockProjectClient {
    async fn check_write(&self, key: &str) -> Result<()> {
        let mut state = self.platform.state.write().await;

        if let Some(remaining) = state.rate_limit_on.get_mut(key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(MigrateError::RateLimited(format!("throttled: {}", key)));
            }
        }

        if state.fail_on.contains(key) {
            return Err(MigrateError::Remote(format!("injected failure: {}", key)));
        }

        Ok(())
    }

    async fn record(&self, key: &str) {
        debug!("mock: created {} in {}", key, self.project_id);
        self.platform
            .state
            .write()
            .await
            .call_log
            .push(format!("{} {}", self.project_id, key));
    }

    async fn read_project<T>(
        &self,
        f: impl FnOnce(&ProjectState) -> Result<T>,
    ) -> Result<T> {
        let state = self.platform.state.read().await;
        let project = state
            .projects
            .get(&self.project_id)
            .ok_or_else(|| MigrateError::Unauthorized(format!("unknown project {}", self.project_id)))?;
        f(project)
    }

    async fn write_project<T>(
        &self,
        f: impl FnOnce(&mut ProjectState) -> Result<T>,
    ) -> Result<T> {
        let mut state = self.platform.state.write().await;
        let project = state
            .projects
            .get_mut(&self.project_id)
            .ok_or_else(|| MigrateError::Unauthorized(format!("unknown project {}", self.project_id)))?;
        f(project)
    }

    /// Simulate the deployed transfer worker: perform the task between the
    /// platform's projects and return the finished execution
    async fn run_transfer(&self, task: &TransferTask) -> Execution {
        let mut state = self.platform.state.write().await;

        let outcome: std::result::Result<(), String> = match task {
            TransferTask::File {
                source,
                dest,
                bucket_id,
                file_id,
                dest_bucket_id,
                dest_file_id,
                file_name,
            } => {
                let content = state
                    .projects
                    .get(&source.project_id)
                    .and_then(|p| p.file_contents.get(&(bucket_id.clone(), file_id.clone())))
                    .cloned();
                match content {
                    None => Err(format!("source file {}/{} not found", bucket_id, file_id)),
                    Some(content) => match state.projects.get_mut(&dest.project_id) {
                        None => Err(format!("unknown destination project {}", dest.project_id)),
                        Some(project) => {
                            let size = content.len() as u64;
                            project
                                .file_contents
                                .insert((dest_bucket_id.clone(), dest_file_id.clone()), content);
                            project.files.entry(dest_bucket_id.clone()).or_default().push(
                                FileEntry {
                                    id: dest_file_id.clone(),
                                    bucket_id: dest_bucket_id.clone(),
                                    name: file_name.clone(),
                                    size,
                                },
                            );
                            Ok(())
                        }
                    },
                }
            }
            TransferTask::FunctionCode {
                source,
                dest,
                function_id,
                dest_function_id,
            } => {
                let code = state
                    .projects
                    .get(&source.project_id)
                    .and_then(|p| p.function_code.get(function_id))
                    .cloned();
                match code {
                    None => Err(format!("no code deployed for function {}", function_id)),
                    Some(code) => match state.projects.get_mut(&dest.project_id) {
                        None => Err(format!("unknown destination project {}", dest.project_id)),
                        Some(project) => {
                            project.function_code.insert(dest_function_id.clone(), code);
                            Ok(())
                        }
                    },
                }
            }
        };

        match outcome {
            Ok(()) => Execution {
                id: Uuid::new_v4().to_string(),
                function_id: String::new(),
                status: ExecutionStatus::Completed,
                stderr: String::new(),
            },
            Err(stderr) => Execution {
                id: Uuid::new_v4().to_string(),
                function_id: String::new(),
                status: ExecutionStatus::Failed,
                stderr,
            },
        }
    }
}

#[async_trait::async_trait]
impl ProjectClient for MockProjectClient {
    fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn list_databases(&self, cursor: Option<String>) -> Result<ListPage<Database>> {
        self.read_project(|p| Ok(page_of(&p.databases, cursor))).await
    }

    async fn list_collections(
        &self,
        database_id: &str,
        cursor: Option<String>,
    ) -> Result<ListPage<Collection>> {
        let database_id = database_id.to_string();
        self.read_project(|p| {
            let items = p.collections.get(&database_id).cloned().unwrap_or_default();
            Ok(page_of(&items, cursor))
        })
        .await
    }

    async fn list_documents(
        &self,
        database_id: &str,
        collection_id: &str,
        cursor: Option<String>,
    ) -> Result<ListPage<Document>> {
        let key = (database_id.to_string(), collection_id.to_string());
        self.read_project(|p| {
            let items = p.documents.get(&key).cloned().unwrap_or_default();
            Ok(page_of(&items, cursor))
        })
        .await
    }

    async fn create_database(&self, database: &Database) -> Result<()> {
        let key = node_key(ResourceKind::Database, &[], &database.id);
        self.check_write(&key).await?;
        self.write_project(|p| {
            if p.databases.iter().any(|d| d.id == database.id) {
                return Err(MigrateError::Conflict(format!("database {}", database.id)));
            }
            p.databases.push(database.clone());
            Ok(())
        })
        .await?;
        self.record(&key).await;
        Ok(())
    }

    async fn create_collection(&self, collection: &Collection) -> Result<()> {
        let key = node_key(
            ResourceKind::Collection,
            &[&collection.database_id],
            &collection.id,
        );
        self.check_write(&key).await?;
        self.write_project(|p| {
            if !p.databases.iter().any(|d| d.id == collection.database_id) {
                return Err(MigrateError::NotFound(format!(
                    "database {}",
                    collection.database_id
                )));
            }
            let group = p.collections.entry(collection.database_id.clone()).or_default();
            if group.iter().any(|c| c.id == collection.id) {
                return Err(MigrateError::Conflict(format!("collection {}", collection.id)));
            }
            group.push(collection.clone());
            Ok(())
        })
        .await?;
        self.record(&key).await;
        Ok(())
    }

    async fn create_document(&self, document: &Document) -> Result<()> {
        let key = node_key(
            ResourceKind::Document,
            &[&document.database_id, &document.collection_id],
            &document.id,
        );
        self.check_write(&key).await?;
        self.write_project(|p| {
            let group = p
                .documents
                .entry((document.database_id.clone(), document.collection_id.clone()))
                .or_default();
            if group.iter().any(|d| d.id == document.id) {
                return Err(MigrateError::Conflict(format!("document {}", document.id)));
            }
            group.push(document.clone());
            Ok(())
        })
        .await?;
        self.record(&key).await;
        Ok(())
    }

    async fn list_buckets(&self, cursor: Option<String>) -> Result<ListPage<Bucket>> {
        self.read_project(|p| Ok(page_of(&p.buckets, cursor))).await
    }

    async fn list_files(
        &self,
        bucket_id: &str,
        cursor: Option<String>,
    ) -> Result<ListPage<FileEntry>> {
        let bucket_id = bucket_id.to_string();
        self.read_project(|p| {
            let items = p.files.get(&bucket_id).cloned().unwrap_or_default();
            Ok(page_of(&items, cursor))
        })
        .await
    }

    async fn get_bucket(&self, bucket_id: &str) -> Result<Bucket> {
        let bucket_id = bucket_id.to_string();
        self.read_project(|p| {
            p.buckets
                .iter()
                .find(|b| b.id == bucket_id)
                .cloned()
                .ok_or_else(|| MigrateError::NotFound(format!("bucket {}", bucket_id)))
        })
        .await
    }

    async fn create_bucket(&self, bucket: &Bucket) -> Result<()> {
        let key = node_key(ResourceKind::Bucket, &[], &bucket.id);
        self.check_write(&key).await?;
        self.write_project(|p| {
            if p.buckets.iter().any(|b| b.id == bucket.id) {
                return Err(MigrateError::Conflict(format!("bucket {}", bucket.id)));
            }
            p.buckets.push(bucket.clone());
            Ok(())
        })
        .await?;
        self.record(&key).await;
        Ok(())
    }

    async fn download_file(&self, bucket_id: &str, file_id: &str) -> Result<Vec<u8>> {
        let key = (bucket_id.to_string(), file_id.to_string());
        self.read_project(|p| {
            p.file_contents
                .get(&key)
                .cloned()
                .ok_or_else(|| MigrateError::NotFound(format!("file {}/{}", key.0, key.1)))
        })
        .await
    }

    async fn upload_file(&self, file: &FileEntry, content: Vec<u8>) -> Result<()> {
        let key = node_key(ResourceKind::File, &[&file.bucket_id], &file.id);
        self.check_write(&key).await?;
        let file = file.clone();
        self.write_project(move |p| {
            // Payload writes replace; metadata rows stay unique
            p.file_contents
                .insert((file.bucket_id.clone(), file.id.clone()), content);
            let group = p.files.entry(file.bucket_id.clone()).or_default();
            group.retain(|f| f.id != file.id);
            group.push(file);
            Ok(())
        })
        .await?;
        self.record(&key).await;
        Ok(())
    }

    async fn list_functions(&self, cursor: Option<String>) -> Result<ListPage<Function>> {
        self.read_project(|p| Ok(page_of(&p.functions, cursor))).await
    }

    async fn create_function(&self, function: &Function) -> Result<()> {
        let key = node_key(ResourceKind::Function, &[], &function.id);
        self.check_write(&key).await?;
        self.write_project(|p| {
            if p.functions.iter().any(|f| f.id == function.id) {
                return Err(MigrateError::Conflict(format!("function {}", function.id)));
            }
            p.functions.push(function.clone());
            Ok(())
        })
        .await?;
        self.record(&key).await;
        Ok(())
    }

    async fn download_function_code(&self, function_id: &str) -> Result<Vec<u8>> {
        let function_id = function_id.to_string();
        self.read_project(|p| {
            p.function_code
                .get(&function_id)
                .cloned()
                .ok_or_else(|| {
                    MigrateError::NotFound(format!("no deployment for function {}", function_id))
                })
        })
        .await
    }

    async fn deploy_function_code(&self, function_id: &str, code: Vec<u8>) -> Result<()> {
        let function_id = function_id.to_string();
        self.write_project(move |p| {
            if !p.functions.iter().any(|f| f.id == function_id) {
                return Err(MigrateError::NotFound(format!("function {}", function_id)));
            }
            p.function_code.insert(function_id, code);
            Ok(())
        })
        .await
    }

    async fn create_execution(
        &self,
        function_id: &str,
        payload: serde_json::Value,
    ) -> Result<Execution> {
        self.read_project(|p| {
            if !p.function_code.contains_key(function_id) {
                return Err(MigrateError::NotFound(format!(
                    "no deployment for function {}",
                    function_id
                )));
            }
            Ok(())
        })
        .await?;

        let task: TransferTask = serde_json::from_value(payload)?;
        let mut finished = self.run_transfer(&task).await;
        finished.function_id = function_id.to_string();

        let pending = Execution {
            status: ExecutionStatus::Processing,
            ..finished.clone()
        };

        self.write_project(|p| {
            p.executions.insert(finished.id.clone(), finished);
            Ok(())
        })
        .await?;

        Ok(pending)
    }

    async fn get_execution(&self, _function_id: &str, execution_id: &str) -> Result<Execution> {
        let execution_id = execution_id.to_string();
        self.read_project(|p| {
            p.executions
                .get(&execution_id)
                .cloned()
                .ok_or_else(|| MigrateError::NotFound(format!("execution {}", execution_id)))
        })
        .await
    }

    async fn list_teams(&self, cursor: Option<String>) -> Result<ListPage<Team>> {
        self.read_project(|p| Ok(page_of(&p.teams, cursor))).await
    }

    async fn list_memberships(
        &self,
        team_id: &str,
        cursor: Option<String>,
    ) -> Result<ListPage<Membership>> {
        let team_id = team_id.to_string();
        self.read_project(|p| {
            let items = p.memberships.get(&team_id).cloned().unwrap_or_default();
            Ok(page_of(&items, cursor))
        })
        .await
    }

    async fn create_team(&self, team: &Team) -> Result<()> {
        let key = node_key(ResourceKind::Team, &[], &team.id);
        self.check_write(&key).await?;
        self.write_project(|p| {
            if p.teams.iter().any(|t| t.id == team.id) {
                return Err(MigrateError::Conflict(format!("team {}", team.id)));
            }
            p.teams.push(team.clone());
            Ok(())
        })
        .await?;
        self.record(&key).await;
        Ok(())
    }

    async fn create_membership(&self, membership: &Membership) -> Result<()> {
        let key = node_key(
            ResourceKind::Membership,
            &[&membership.team_id],
            &membership.id,
        );
        self.check_write(&key).await?;
        self.write_project(|p| {
            let group = p.memberships.entry(membership.team_id.clone()).or_default();
            if group.iter().any(|m| m.id == membership.id) {
                return Err(MigrateError::Conflict(format!("membership {}", membership.id)));
            }
            group.push(membership.clone());
            Ok(())
        })
        .await?;
        self.record(&key).await;
        Ok(())
    }

    async fn list_users(&self, cursor: Option<String>) -> Result<ListPage<User>> {
        self.read_project(|p| Ok(page_of(&p.users, cursor))).await
    }

    async fn create_user(&self, user: &User) -> Result<()> {
        let key = node_key(ResourceKind::User, &[], &user.id);
        self.check_write(&key).await?;
        self.write_project(|p| {
            if p.users.iter().any(|u| u.id == user.id) {
                return Err(MigrateError::Conflict(format!("user {}", user.id)));
            }
            p.users.push(user.clone());
            Ok(())
        })
        .await?;
        self.record(&key).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_project_is_unauthorized() {
        let platform = MockPlatform::new();
        let client = platform.client("nope");

        let err = client.list_databases(None).await.unwrap_err();
        assert!(matches!(err, MigrateError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_listing_paginates() {
        let platform = MockPlatform::new();
        platform.create_project("p1").await;
        let client = platform.client("p1");

        for i in 0..7 {
            client
                .create_user(&User {
                    id: format!("user-{}", i),
                    email: format!("u{}@example.com", i),
                    name: format!("User {}", i),
                })
                .await
                .unwrap();
        }

        let first = client.list_users(None).await.unwrap();
        assert_eq!(first.items.len(), PAGE_SIZE);
        assert!(first.next_cursor.is_some());

        let all = crate::client::list_all(|cursor| client.list_users(cursor))
            .await
            .unwrap();
        assert_eq!(all.len(), 7);
    }

    #[tokio::test]
    async fn test_duplicate_create_conflicts() {
        let platform = MockPlatform::new();
        platform.create_project("p1").await;
        let client = platform.client("p1");

        let db = Database {
            id: "db-a".to_string(),
            name: "Main".to_string(),
        };
        client.create_database(&db).await.unwrap();
        let err = client.create_database(&db).await.unwrap_err();
        assert!(matches!(err, MigrateError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_injected_failure_and_clear() {
        let platform = MockPlatform::new();
        platform.create_project("p1").await;
        let client = platform.client("p1");

        platform.fail_on("team:qa").await;
        let team = Team {
            id: "qa".to_string(),
            name: "QA".to_string(),
        };
        assert!(client.create_team(&team).await.is_err());

        platform.clear_failures().await;
        client.create_team(&team).await.unwrap();
        assert_eq!(platform.creations().await, vec!["p1 team:qa"]);
    }

    #[tokio::test]
    async fn test_rate_limit_releases_after_n_calls() {
        let platform = MockPlatform::new();
        platform.create_project("p1").await;
        let client = platform.client("p1");
        platform.rate_limit("user:u1", 2).await;

        let user = User {
            id: "u1".to_string(),
            email: "u1@example.com".to_string(),
            name: "U1".to_string(),
        };
        assert!(matches!(
            client.create_user(&user).await.unwrap_err(),
            MigrateError::RateLimited(_)
        ));
        assert!(matches!(
            client.create_user(&user).await.unwrap_err(),
            MigrateError::RateLimited(_)
        ));
        client.create_user(&user).await.unwrap();
    }
}
