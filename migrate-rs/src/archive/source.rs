//! Read-side client adapter over an unpacked archive
//!
//! Lets a restore run feed the transfer executor exactly as a migration
//! does: the archive plays the source project, the real project is the
//! destination. Every write operation is rejected.

use crate::client::types::*;
use crate::client::ProjectClient;
use crate::error::{MigrateError, Result};

use super::types::RestoreBundle;
use super::{payload_path_file, payload_path_function};

pub struct ArchiveSource {
    bundle: RestoreBundle,
}

impl ArchiveSource {
    pub fn new(bundle: RestoreBundle) -> Self {
        Self { bundle }
    }

    fn read_only<T>(&self) -> Result<T> {
        Err(MigrateError::Archive("archive is read-only".to_string()))
    }

    fn single_page<T>(items: Vec<T>) -> ListPage<T> {
        ListPage::new(items, None)
    }
}

#[async_trait::async_trait]
impl ProjectClient for ArchiveSource {
    fn project_id(&self) -> &str {
        &self.bundle.manifest.project_id
    }

    async fn list_databases(&self, _cursor: Option<String>) -> Result<ListPage<Database>> {
        Ok(Self::single_page(
            self.bundle
                .manifest
                .databases
                .iter()
                .map(|d| d.database.clone())
                .collect(),
        ))
    }

    async fn list_collections(
        &self,
        database_id: &str,
        _cursor: Option<String>,
    ) -> Result<ListPage<Collection>> {
        let collections = self
            .bundle
            .manifest
            .databases
            .iter()
            .find(|d| d.database.id == database_id)
            .map(|d| d.collections.iter().map(|c| c.collection.clone()).collect())
            .unwrap_or_default();
        Ok(Self::single_page(collections))
    }

    async fn list_documents(
        &self,
        database_id: &str,
        collection_id: &str,
        _cursor: Option<String>,
    ) -> Result<ListPage<Document>> {
        let documents = self
            .bundle
            .manifest
            .databases
            .iter()
            .find(|d| d.database.id == database_id)
            .and_then(|d| d.collections.iter().find(|c| c.collection.id == collection_id))
            .map(|c| c.documents.clone())
            .unwrap_or_default();
        Ok(Self::single_page(documents))
    }

    async fn create_database(&self, _database: &Database) -> Result<()> {
        self.read_only()
    }

    async fn create_collection(&self, _collection: &Collection) -> Result<()> {
        self.read_only()
    }

    async fn create_document(&self, _document: &Document) -> Result<()> {
        self.read_only()
    }

    async fn list_buckets(&self, _cursor: Option<String>) -> Result<ListPage<Bucket>> {
        Ok(Self::single_page(
            self.bundle
                .manifest
                .buckets
                .iter()
                .map(|b| b.bucket.clone())
                .collect(),
        ))
    }

    async fn list_files(
        &self,
        bucket_id: &str,
        _cursor: Option<String>,
    ) -> Result<ListPage<FileEntry>> {
        let files = self
            .bundle
            .manifest
            .buckets
            .iter()
            .find(|b| b.bucket.id == bucket_id)
            .map(|b| b.files.clone())
            .unwrap_or_default();
        Ok(Self::single_page(files))
    }

    async fn get_bucket(&self, bucket_id: &str) -> Result<Bucket> {
        self.bundle
            .manifest
            .buckets
            .iter()
            .find(|b| b.bucket.id == bucket_id)
            .map(|b| b.bucket.clone())
            .ok_or_else(|| MigrateError::NotFound(format!("bucket {}", bucket_id)))
    }

    async fn create_bucket(&self, _bucket: &Bucket) -> Result<()> {
        self.read_only()
    }

    async fn download_file(&self, bucket_id: &str, file_id: &str) -> Result<Vec<u8>> {
        self.bundle
            .payloads
            .get(&payload_path_file(bucket_id, file_id))
            .cloned()
            .ok_or_else(|| {
                MigrateError::Archive(format!(
                    "archive has no payload for file {}/{}",
                    bucket_id, file_id
                ))
            })
    }

    async fn upload_file(&self, _file: &FileEntry, _content: Vec<u8>) -> Result<()> {
        self.read_only()
    }

    async fn list_functions(&self, _cursor: Option<String>) -> Result<ListPage<Function>> {
        Ok(Self::single_page(self.bundle.manifest.functions.clone()))
    }

    async fn create_function(&self, _function: &Function) -> Result<()> {
        self.read_only()
    }

    async fn download_function_code(&self, function_id: &str) -> Result<Vec<u8>> {
        self.bundle
            .payloads
            .get(&payload_path_function(function_id))
            .cloned()
            .ok_or_else(|| {
                MigrateError::NotFound(format!("no code embedded for function {}", function_id))
            })
    }

    async fn deploy_function_code(&self, _function_id: &str, _code: Vec<u8>) -> Result<()> {
        self.read_only()
    }

    async fn create_execution(
        &self,
        _function_id: &str,
        _payload: serde_json::Value,
    ) -> Result<Execution> {
        self.read_only()
    }

    async fn get_execution(&self, _function_id: &str, _execution_id: &str) -> Result<Execution> {
        self.read_only()
    }

    async fn list_teams(&self, _cursor: Option<String>) -> Result<ListPage<Team>> {
        Ok(Self::single_page(
            self.bundle
                .manifest
                .teams
                .iter()
                .map(|t| t.team.clone())
                .collect(),
        ))
    }

    async fn list_memberships(
        &self,
        team_id: &str,
        _cursor: Option<String>,
    ) -> Result<ListPage<Membership>> {
        let memberships = self
            .bundle
            .manifest
            .teams
            .iter()
            .find(|t| t.team.id == team_id)
            .map(|t| t.memberships.clone())
            .unwrap_or_default();
        Ok(Self::single_page(memberships))
    }

    async fn create_team(&self, _team: &Team) -> Result<()> {
        self.read_only()
    }

    async fn create_membership(&self, _membership: &Membership) -> Result<()> {
        self.read_only()
    }

    async fn list_users(&self, _cursor: Option<String>) -> Result<ListPage<User>> {
        Ok(Self::single_page(self.bundle.manifest.users.clone()))
    }

    async fn create_user(&self, _user: &User) -> Result<()> {
        self.read_only()
    }
}
