//! Remote platform API client
//!
//! The scanner, executor, proxy integration and archive codec are all
//! written against the [`ProjectClient`] trait and never touch transport
//! details. Two implementations ship with the crate: an HTTP client for the
//! real platform and an in-memory mock platform used by tests and the e2e
//! suite.

pub mod http;
pub mod mock;
pub mod types;

pub use http::HttpProjectClient;
pub use mock::{MockPlatform, MockProjectClient};
pub use types::*;

use crate::error::Result;
use std::future::Future;

/// Remote API surface for one project
///
/// List operations are cursor-paginated; callers that need the full listing
/// go through [`list_all`] and never see partial pages.
#[async_trait::async_trait]
pub trait ProjectClient: Send + Sync {
    /// Identifier of the project this client is bound to
    fn project_id(&self) -> &str;

    // Databases
    async fn list_databases(&self, cursor: Option<String>) -> Result<ListPage<Database>>;
    async fn list_collections(
        &self,
        database_id: &str,
        cursor: Option<String>,
    ) -> Result<ListPage<Collection>>;
    async fn list_documents(
        &self,
        database_id: &str,
        collection_id: &str,
        cursor: Option<String>,
    ) -> Result<ListPage<Document>>;
    async fn create_database(&self, database: &Database) -> Result<()>;
    async fn create_collection(&self, collection: &Collection) -> Result<()>;
    async fn create_document(&self, document: &Document) -> Result<()>;

    // Storage
    async fn list_buckets(&self, cursor: Option<String>) -> Result<ListPage<Bucket>>;
    async fn list_files(
        &self,
        bucket_id: &str,
        cursor: Option<String>,
    ) -> Result<ListPage<FileEntry>>;
    async fn get_bucket(&self, bucket_id: &str) -> Result<Bucket>;
    async fn create_bucket(&self, bucket: &Bucket) -> Result<()>;
    async fn download_file(&self, bucket_id: &str, file_id: &str) -> Result<Vec<u8>>;
    async fn upload_file(&self, file: &FileEntry, content: Vec<u8>) -> Result<()>;

    // Functions
    async fn list_functions(&self, cursor: Option<String>) -> Result<ListPage<Function>>;
    async fn create_function(&self, function: &Function) -> Result<()>;
    async fn download_function_code(&self, function_id: &str) -> Result<Vec<u8>>;
    async fn deploy_function_code(&self, function_id: &str, code: Vec<u8>) -> Result<()>;
    async fn create_execution(
        &self,
        function_id: &str,
        payload: serde_json::Value,
    ) -> Result<Execution>;
    async fn get_execution(&self, function_id: &str, execution_id: &str) -> Result<Execution>;

    // Teams
    async fn list_teams(&self, cursor: Option<String>) -> Result<ListPage<Team>>;
    async fn list_memberships(
        &self,
        team_id: &str,
        cursor: Option<String>,
    ) -> Result<ListPage<Membership>>;
    async fn create_team(&self, team: &Team) -> Result<()>;
    async fn create_membership(&self, membership: &Membership) -> Result<()>;

    // Users
    async fn list_users(&self, cursor: Option<String>) -> Result<ListPage<User>>;
    async fn create_user(&self, user: &User) -> Result<()>;
}

/// Drain a cursor-paginated listing into one vector
pub async fn list_all<T, F, Fut>(mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<ListPage<T>>>,
{
    let mut items = Vec::new();
    let mut cursor = None;

    loop {
        let page = fetch(cursor).await?;
        items.extend(page.items);
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    Ok(items)
}
