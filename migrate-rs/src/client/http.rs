//! HTTP implementation of the platform client
//!
//! All transport details (endpoints, headers, status mapping) live here;
//! nothing above this module knows it is talking HTTP.

use crate::config::ProjectConfig;
use crate::error::{MigrateError, Result};

use super::types::*;
use super::ProjectClient;

/// Page size requested from the remote on list calls
const PAGE_LIMIT: u32 = 100;

/// Platform client over HTTP
///
/// Credentials are validated only by attempting connection; the first
/// failing call surfaces the problem.
pub struct HttpProjectClient {
    http: reqwest::Client,
    endpoint: String,
    project_id: String,
    api_key: String,
}

impl HttpProjectClient {
    pub fn new(config: &ProjectConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            project_id: config.project_id.clone(),
            api_key: config.api_key.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.url(path))
            .header("X-Platform-Project", &self.project_id)
            .header("X-Platform-Key", &self.api_key)
    }

    /// Map remote status codes onto engine error kinds
    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        Err(match status.as_u16() {
            401 | 403 => MigrateError::Unauthorized(body),
            404 => MigrateError::NotFound(body),
            409 => MigrateError::Conflict(body),
            429 => MigrateError::RateLimited(body),
            _ => MigrateError::Remote(format!("{}: {}", status, body)),
        })
    }

    async fn get_page<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        cursor: Option<String>,
    ) -> Result<ListPage<T>> {
        let mut req = self
            .request(reqwest::Method::GET, path)
            .query(&[("limit", PAGE_LIMIT.to_string())]);
        if let Some(cursor) = cursor {
            req = req.query(&[("cursor", cursor)]);
        }

        let resp = Self::check(req.send().await?).await?;
        Ok(resp.json().await?)
    }

    async fn post_json<B: serde::Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let resp = self
            .request(reqwest::Method::POST, path)
            .json(body)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn get_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let resp = self.request(reqwest::Method::GET, path).send().await?;
        let resp = Self::check(resp).await?;
        Ok(resp.bytes().await?.to_vec())
    }
}

#[async_trait::async_trait]
impl ProjectClient for HttpProjectClient {
    fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn list_databases(&self, cursor: Option<String>) -> Result<ListPage<Database>> {
        self.get_page("/databases", cursor).await
    }

    async fn list_collections(
        &self,
        database_id: &str,
        cursor: Option<String>,
    ) -> Result<ListPage<Collection>> {
        self.get_page(&format!("/databases/{}/collections", database_id), cursor)
            .await
    }

    async fn list_documents(
        &self,
        database_id: &str,
        collection_id: &str,
        cursor: Option<String>,
    ) -> Result<ListPage<Document>> {
        self.get_page(
            &format!(
                "/databases/{}/collections/{}/documents",
                database_id, collection_id
            ),
            cursor,
        )
        .await
    }

    async fn create_database(&self, database: &Database) -> Result<()> {
        self.post_json("/databases", database).await
    }

    async fn create_collection(&self, collection: &Collection) -> Result<()> {
        self.post_json(
            &format!("/databases/{}/collections", collection.database_id),
            collection,
        )
        .await
    }

    async fn create_document(&self, document: &Document) -> Result<()> {
        self.post_json(
            &format!(
                "/databases/{}/collections/{}/documents",
                document.database_id, document.collection_id
            ),
            document,
        )
        .await
    }

    async fn list_buckets(&self, cursor: Option<String>) -> Result<ListPage<Bucket>> {
        self.get_page("/storage/buckets", cursor).await
    }

    async fn list_files(
        &self,
        bucket_id: &str,
        cursor: Option<String>,
    ) -> Result<ListPage<FileEntry>> {
        self.get_page(&format!("/storage/buckets/{}/files", bucket_id), cursor)
            .await
    }

    async fn get_bucket(&self, bucket_id: &str) -> Result<Bucket> {
        let resp = self
            .request(
                reqwest::Method::GET,
                &format!("/storage/buckets/{}", bucket_id),
            )
            .send()
            .await?;
        let resp = Self::check(resp).await?;
        Ok(resp.json().await?)
    }

    async fn create_bucket(&self, bucket: &Bucket) -> Result<()> {
        self.post_json("/storage/buckets", bucket).await
    }

    async fn download_file(&self, bucket_id: &str, file_id: &str) -> Result<Vec<u8>> {
        self.get_bytes(&format!(
            "/storage/buckets/{}/files/{}/download",
            bucket_id, file_id
        ))
        .await
    }

    async fn upload_file(&self, file: &FileEntry, content: Vec<u8>) -> Result<()> {
        let resp = self
            .request(
                reqwest::Method::POST,
                &format!("/storage/buckets/{}/files/{}", file.bucket_id, file.id),
            )
            .query(&[("name", file.name.as_str())])
            .body(content)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn list_functions(&self, cursor: Option<String>) -> Result<ListPage<Function>> {
        self.get_page("/functions", cursor).await
    }

    async fn create_function(&self, function: &Function) -> Result<()> {
        self.post_json("/functions", function).await
    }

    async fn download_function_code(&self, function_id: &str) -> Result<Vec<u8>> {
        self.get_bytes(&format!("/functions/{}/deployments/active/download", function_id))
            .await
    }

    async fn deploy_function_code(&self, function_id: &str, code: Vec<u8>) -> Result<()> {
        let resp = self
            .request(
                reqwest::Method::POST,
                &format!("/functions/{}/deployments", function_id),
            )
            .body(code)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn create_execution(
        &self,
        function_id: &str,
        payload: serde_json::Value,
    ) -> Result<Execution> {
        let resp = self
            .request(
                reqwest::Method::POST,
                &format!("/functions/{}/executions", function_id),
            )
            .json(&payload)
            .send()
            .await?;
        let resp = Self::check(resp).await?;
        Ok(resp.json().await?)
    }

    async fn get_execution(&self, function_id: &str, execution_id: &str) -> Result<Execution> {
        let resp = self
            .request(
                reqwest::Method::GET,
                &format!("/functions/{}/executions/{}", function_id, execution_id),
            )
            .send()
            .await?;
        let resp = Self::check(resp).await?;
        Ok(resp.json().await?)
    }

    async fn list_teams(&self, cursor: Option<String>) -> Result<ListPage<Team>> {
        self.get_page("/teams", cursor).await
    }

    async fn list_memberships(
        &self,
        team_id: &str,
        cursor: Option<String>,
    ) -> Result<ListPage<Membership>> {
        self.get_page(&format!("/teams/{}/memberships", team_id), cursor)
            .await
    }

    async fn create_team(&self, team: &Team) -> Result<()> {
        self.post_json("/teams", team).await
    }

    async fn create_membership(&self, membership: &Membership) -> Result<()> {
        self.post_json(
            &format!("/teams/{}/memberships", membership.team_id),
            membership,
        )
        .await
    }

    async fn list_users(&self, cursor: Option<String>) -> Result<ListPage<User>> {
        self.get_page("/users", cursor).await
    }

    async fn create_user(&self, user: &User) -> Result<()> {
        self.post_json("/users", user).await
    }
}
