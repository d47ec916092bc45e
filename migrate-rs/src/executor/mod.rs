//! Transfer executor
//!
//! Walks an approved plan in dependency order and creates resources on the
//! destination, consulting and updating the checkpoint store as it goes.
//! Each run is driven through a [`RunHandle`] returned by [`TransferExecutor::start`],
//! which owns cancellation and status for that run; there is no ambient
//! "current run" state.

pub mod types;

pub use types::{RunReport, RunStatus};

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, TryStreamExt};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::checkpoint::CheckpointStore;
use crate::client::types::*;
use crate::client::{list_all, ProjectClient};
use crate::error::{MigrateError, Result};
use crate::plan::{node_key, MigrationPlan, ResourceKind, ResourceNode};
use crate::proxy::{ProxyWorker, RemoteRef, TransferTask};

/// Attempts per leaf request before a rate-limited response counts as a
/// hard failure
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for rate-limit backoff
const RETRY_BASE_DELAY_MS: u64 = 500;

/// How file and function-source payloads reach the destination
pub enum PayloadStrategy {
    /// Download from source and upload to destination through this process.
    /// Slower and bandwidth-bound, but needs no deployed compute.
    Direct,
    /// Delegate to a deployed proxy worker streaming server-to-server
    Proxy {
        worker: ProxyWorker,
        source: RemoteRef,
        dest: RemoteRef,
    },
}

/// Executes approved plans against a destination project
pub struct TransferExecutor {
    source: Arc<dyn ProjectClient>,
    dest: Arc<dyn ProjectClient>,
    checkpoints: Arc<dyn CheckpointStore>,
    payload: PayloadStrategy,
    leaf_concurrency: usize,
}

/// Handle to one in-flight run
///
/// Cancellation trips a flag checked at node boundaries: the in-flight call
/// for the current node finishes, no new node starts afterwards.
pub struct RunHandle {
    token: CancellationToken,
    status: Arc<RwLock<RunStatus>>,
    join: JoinHandle<RunReport>,
}

impl RunHandle {
    /// Request cooperative cancellation
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub async fn status(&self) -> RunStatus {
        *self.status.read().await
    }

    /// Await the run's terminal report
    pub async fn wait(self) -> Result<RunReport> {
        self.join
            .await
            .map_err(|e| std::io::Error::other(format!("run task failed: {}", e)).into())
    }
}

impl TransferExecutor {
    pub fn new(
        source: Arc<dyn ProjectClient>,
        dest: Arc<dyn ProjectClient>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            source,
            dest,
            checkpoints,
            payload: PayloadStrategy::Direct,
            leaf_concurrency: 4,
        }
    }

    pub fn with_leaf_concurrency(mut self, limit: usize) -> Self {
        self.leaf_concurrency = limit.max(1);
        self
    }

    /// Use a deployed proxy worker for payload transfer
    pub fn with_proxy(mut self, worker: ProxyWorker, source: RemoteRef, dest: RemoteRef) -> Self {
        self.payload = PayloadStrategy::Proxy {
            worker,
            source,
            dest,
        };
        self
    }

    /// Whether any prior run between this executor's source/destination pair
    /// left checkpoints behind; exposed so callers can offer "resume"
    pub async fn has_prior_checkpoint(&self) -> Result<bool> {
        self.checkpoints
            .has_any(self.source.project_id(), self.dest.project_id())
            .await
    }

    /// Start a run in the background and return its handle
    pub fn start(self: Arc<Self>, plan: MigrationPlan, resume: bool) -> RunHandle {
        let token = CancellationToken::new();
        let status = Arc::new(RwLock::new(RunStatus::Running));

        let executor = self;
        let run_token = token.clone();
        let run_status = Arc::clone(&status);

        let join = tokio::spawn(async move {
            let run_id = Uuid::new_v4().to_string();
            let started_at = Utc::now();
            info!(
                "Run {} starting: {} -> {} (resume: {})",
                run_id,
                executor.source.project_id(),
                executor.dest.project_id(),
                resume
            );

            let report = executor.run(&plan, resume, run_token, &run_id, started_at).await;

            *run_status.write().await = report.status;
            info!(
                "Run {} finished: {} ({} created, {} skipped)",
                run_id, report.status, report.created, report.skipped
            );
            report
        });

        RunHandle {
            token,
            status,
            join,
        }
    }

    /// Run a plan to completion
    pub async fn execute(self: Arc<Self>, plan: MigrationPlan, resume: bool) -> Result<RunReport> {
        self.start(plan, resume).wait().await
    }

    async fn run(
        &self,
        plan: &MigrationPlan,
        resume: bool,
        token: CancellationToken,
        run_id: &str,
        started_at: chrono::DateTime<Utc>,
    ) -> RunReport {
        let completed = if resume {
            match self
                .checkpoints
                .get(self.source.project_id(), self.dest.project_id())
                .await
            {
                Ok(entries) => entries.into_keys().collect(),
                Err(e) => {
                    return RunReport {
                        run_id: run_id.to_string(),
                        status: RunStatus::Failed,
                        created: 0,
                        skipped: 0,
                        error: Some(e.to_string()),
                        started_at,
                        finished_at: Utc::now(),
                    }
                }
            }
        } else {
            HashSet::new()
        };

        let run = Run {
            executor: self,
            token,
            resume,
            completed,
            created: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        };

        let (status, error) = match run.walk(plan).await {
            Ok(()) => (RunStatus::Completed, None),
            Err(MigrateError::ForceStopped) => (RunStatus::Stopped, None),
            Err(e) => (RunStatus::Failed, Some(e.to_string())),
        };

        RunReport {
            run_id: run_id.to_string(),
            status,
            created: run.created.load(Ordering::Relaxed),
            skipped: run.skipped.load(Ordering::Relaxed),
            error,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

/// State of one run over a borrowed executor
struct Run<'a> {
    executor: &'a TransferExecutor,
    token: CancellationToken,
    resume: bool,
    /// Node keys already checkpointed for this pair; consulted only when
    /// resuming
    completed: HashSet<String>,
    created: AtomicU64,
    skipped: AtomicU64,
}

impl<'a> Run<'a> {
    fn source(&self) -> &dyn ProjectClient {
        self.executor.source.as_ref()
    }

    fn dest(&self) -> &dyn ProjectClient {
        self.executor.dest.as_ref()
    }

    /// Cancellation check, applied at node boundaries
    fn ensure_active(&self) -> Result<()> {
        if self.token.is_cancelled() {
            Err(MigrateError::ForceStopped)
        } else {
            Ok(())
        }
    }

    /// Create one node on the destination unless a checkpoint already covers
    /// it. On success the checkpoint entry is recorded before any children
    /// or payloads are processed.
    async fn materialize<F, Fut>(
        &self,
        kind: ResourceKind,
        key: String,
        target_id: &str,
        create: F,
    ) -> Result<()>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        if self.resume && self.completed.contains(&key) {
            debug!("Skipping {} (checkpointed)", key);
            self.skipped.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        with_backoff(&create).await.map_err(|e| match e {
            MigrateError::ForceStopped => e,
            other => MigrateError::Creation {
                kind,
                id: target_id.to_string(),
                reason: other.to_string(),
            },
        })?;

        self.executor
            .checkpoints
            .mark_complete(
                self.source().project_id(),
                self.dest().project_id(),
                &key,
                target_id,
            )
            .await?;
        self.created.fetch_add(1, Ordering::Relaxed);
        debug!("Created {}", key);
        Ok(())
    }

    /// Fixed execution order; later categories may reference earlier ones by
    /// identifier, so this must not be reordered.
    async fn walk(&self, plan: &MigrationPlan) -> Result<()> {
        self.walk_databases(plan).await?;
        self.walk_buckets(plan).await?;
        self.walk_functions(plan).await?;
        self.walk_teams(plan).await?;
        self.walk_users(plan).await?;
        Ok(())
    }

    async fn walk_databases(&self, plan: &MigrationPlan) -> Result<()> {
        for node in &plan.databases {
            self.ensure_active()?;
            if !node.enabled {
                debug!("Skipping disabled database {}", node.source_id);
                continue;
            }

            let key = node_key(ResourceKind::Database, &[], &node.source_id);
            self.materialize(ResourceKind::Database, key, &node.target_id, || {
                let database = Database {
                    id: node.target_id.clone(),
                    name: node.target_name.clone(),
                };
                async move { self.dest().create_database(&database).await }
            })
            .await?;

            // Collection attributes are read from the source at execution
            // time; the plan carries only the mapping
            let source_collections: HashMap<String, Collection> = if node
                .children
                .iter()
                .any(|c| c.enabled)
            {
                list_all(|cursor| self.source().list_collections(&node.source_id, cursor))
                    .await?
                    .into_iter()
                    .map(|c| (c.id.clone(), c))
                    .collect()
            } else {
                HashMap::new()
            };

            for child in &node.children {
                self.ensure_active()?;
                if !child.enabled {
                    continue;
                }

                let attributes = source_collections
                    .get(&child.source_id)
                    .map(|c| c.attributes.clone())
                    .unwrap_or_default();

                let key = node_key(
                    ResourceKind::Collection,
                    &[&node.source_id],
                    &child.source_id,
                );
                self.materialize(ResourceKind::Collection, key, &child.target_id, || {
                    let collection = Collection {
                        id: child.target_id.clone(),
                        database_id: node.target_id.clone(),
                        name: child.target_name.clone(),
                        attributes: attributes.clone(),
                    };
                    async move { self.dest().create_collection(&collection).await }
                })
                .await?;

                if plan.options.include_documents {
                    self.walk_documents(node, child).await?;
                }
            }
        }
        Ok(())
    }

    async fn walk_documents(&self, database: &ResourceNode, collection: &ResourceNode) -> Result<()> {
        let documents = list_all(|cursor| {
            self.source()
                .list_documents(&database.source_id, &collection.source_id, cursor)
        })
        .await?;

        self.ensure_active()?;
        stream::iter(documents.into_iter().map(Ok))
            .try_for_each_concurrent(self.executor.leaf_concurrency, |document| async move {
                self.ensure_active()?;
                let key = node_key(
                    ResourceKind::Document,
                    &[&database.source_id, &collection.source_id],
                    &document.id,
                );
                self.materialize(ResourceKind::Document, key, &document.id, || {
                    let payload = Document {
                        id: document.id.clone(),
                        collection_id: collection.target_id.clone(),
                        database_id: database.target_id.clone(),
                        data: document.data.clone(),
                    };
                    async move { self.dest().create_document(&payload).await }
                })
                .await
            })
            .await
    }

    async fn walk_buckets(&self, plan: &MigrationPlan) -> Result<()> {
        for node in &plan.buckets {
            self.ensure_active()?;
            if !node.enabled {
                debug!("Skipping disabled bucket {}", node.source_id);
                continue;
            }

            let permissions = match self.source().get_bucket(&node.source_id).await {
                Ok(bucket) => bucket.permissions,
                Err(MigrateError::NotFound(_)) => Vec::new(),
                Err(e) => return Err(e),
            };

            let key = node_key(ResourceKind::Bucket, &[], &node.source_id);
            self.materialize(ResourceKind::Bucket, key, &node.target_id, || {
                let bucket = Bucket {
                    id: node.target_id.clone(),
                    name: node.target_name.clone(),
                    permissions: permissions.clone(),
                };
                async move { self.dest().create_bucket(&bucket).await }
            })
            .await?;

            if plan.options.include_files {
                self.walk_files(node).await?;
            }
        }
        Ok(())
    }

    async fn walk_files(&self, bucket: &ResourceNode) -> Result<()> {
        let files = list_all(|cursor| self.source().list_files(&bucket.source_id, cursor)).await?;

        self.ensure_active()?;
        stream::iter(files.into_iter().map(Ok))
            .try_for_each_concurrent(self.executor.leaf_concurrency, |file| async move {
                self.ensure_active()?;
                let key = node_key(ResourceKind::File, &[&bucket.source_id], &file.id);
                self.materialize(ResourceKind::File, key, &file.id, || {
                    self.transfer_file(bucket, &file)
                })
                .await
            })
            .await
    }

    async fn transfer_file(&self, bucket: &ResourceNode, file: &FileEntry) -> Result<()> {
        match &self.executor.payload {
            PayloadStrategy::Direct => {
                let content = self
                    .source()
                    .download_file(&bucket.source_id, &file.id)
                    .await?;
                let entry = FileEntry {
                    id: file.id.clone(),
                    bucket_id: bucket.target_id.clone(),
                    name: file.name.clone(),
                    size: content.len() as u64,
                };
                self.dest().upload_file(&entry, content).await
            }
            PayloadStrategy::Proxy {
                worker,
                source,
                dest,
            } => {
                worker
                    .invoke(&TransferTask::File {
                        source: source.clone(),
                        dest: dest.clone(),
                        bucket_id: bucket.source_id.clone(),
                        file_id: file.id.clone(),
                        dest_bucket_id: bucket.target_id.clone(),
                        dest_file_id: file.id.clone(),
                        file_name: file.name.clone(),
                    })
                    .await
            }
        }
    }

    async fn walk_functions(&self, plan: &MigrationPlan) -> Result<()> {
        let enabled: Vec<&ResourceNode> = plan.functions.iter().filter(|n| n.enabled).collect();
        if enabled.len() < plan.functions.len() {
            debug!(
                "Skipping {} disabled functions",
                plan.functions.len() - enabled.len()
            );
        }
        if enabled.is_empty() {
            return Ok(());
        }

        // Runtime and entrypoint are read from the source at execution time
        let source_functions: HashMap<String, Function> =
            list_all(|cursor| self.source().list_functions(cursor))
                .await?
                .into_iter()
                .map(|f| (f.id.clone(), f))
                .collect();

        for node in enabled {
            self.ensure_active()?;

            let meta = source_functions.get(&node.source_id).ok_or_else(|| {
                MigrateError::NotFound(format!("function {} vanished from source", node.source_id))
            })?;

            let key = node_key(ResourceKind::Function, &[], &node.source_id);
            self.materialize(ResourceKind::Function, key, &node.target_id, || {
                let function = Function {
                    id: node.target_id.clone(),
                    name: node.target_name.clone(),
                    runtime: meta.runtime.clone(),
                    entrypoint: meta.entrypoint.clone(),
                };
                async move { self.dest().create_function(&function).await }
            })
            .await?;

            // Source bundles are payloads, not nodes: re-deployed even for a
            // checkpointed function, since deployments replace
            if plan.options.include_function_code {
                self.transfer_function_code(node).await?;
            }
        }
        Ok(())
    }

    async fn transfer_function_code(&self, node: &ResourceNode) -> Result<()> {
        match &self.executor.payload {
            PayloadStrategy::Direct => {
                let code = match self.source().download_function_code(&node.source_id).await {
                    Ok(code) => code,
                    Err(MigrateError::NotFound(_)) => {
                        // Function exists but nothing was ever deployed
                        warn!("Function {} has no deployment to transfer", node.source_id);
                        return Ok(());
                    }
                    Err(e) => return Err(e),
                };
                self.dest()
                    .deploy_function_code(&node.target_id, code)
                    .await
            }
            PayloadStrategy::Proxy {
                worker,
                source,
                dest,
            } => {
                worker
                    .invoke(&TransferTask::FunctionCode {
                        source: source.clone(),
                        dest: dest.clone(),
                        function_id: node.source_id.clone(),
                        dest_function_id: node.target_id.clone(),
                    })
                    .await
            }
        }
    }

    async fn walk_teams(&self, plan: &MigrationPlan) -> Result<()> {
        for node in &plan.teams {
            self.ensure_active()?;
            if !node.enabled {
                debug!("Skipping disabled team {}", node.source_id);
                continue;
            }

            let key = node_key(ResourceKind::Team, &[], &node.source_id);
            self.materialize(ResourceKind::Team, key, &node.target_id, || {
                let team = Team {
                    id: node.target_id.clone(),
                    name: node.target_name.clone(),
                };
                async move { self.dest().create_team(&team).await }
            })
            .await?;

            self.walk_memberships(node).await?;
        }
        Ok(())
    }

    async fn walk_memberships(&self, team: &ResourceNode) -> Result<()> {
        let memberships =
            list_all(|cursor| self.source().list_memberships(&team.source_id, cursor)).await?;

        self.ensure_active()?;
        stream::iter(memberships.into_iter().map(Ok))
            .try_for_each_concurrent(self.executor.leaf_concurrency, |membership| async move {
                self.ensure_active()?;
                let key = node_key(
                    ResourceKind::Membership,
                    &[&team.source_id],
                    &membership.id,
                );
                self.materialize(ResourceKind::Membership, key, &membership.id, || {
                    let payload = Membership {
                        id: membership.id.clone(),
                        team_id: team.target_id.clone(),
                        user_id: membership.user_id.clone(),
                        roles: membership.roles.clone(),
                    };
                    async move { self.dest().create_membership(&payload).await }
                })
                .await
            })
            .await
    }

    async fn walk_users(&self, plan: &MigrationPlan) -> Result<()> {
        let enabled: Vec<&ResourceNode> = plan.users.iter().filter(|n| n.enabled).collect();
        if enabled.is_empty() {
            return Ok(());
        }

        let source_users: HashMap<String, User> = list_all(|cursor| self.source().list_users(cursor))
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        for node in enabled {
            self.ensure_active()?;

            let meta = source_users.get(&node.source_id).ok_or_else(|| {
                MigrateError::NotFound(format!("user {} vanished from source", node.source_id))
            })?;

            let key = node_key(ResourceKind::User, &[], &node.source_id);
            self.materialize(ResourceKind::User, key, &node.target_id, || {
                let user = User {
                    id: node.target_id.clone(),
                    email: meta.email.clone(),
                    name: node.target_name.clone(),
                };
                async move { self.dest().create_user(&user).await }
            })
            .await?;
        }
        Ok(())
    }
}

/// Retry rate-limited requests with exponential backoff before treating
/// them as hard failures
async fn with_backoff<T, F, Fut>(op: &F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(MigrateError::RateLimited(msg)) if attempt < MAX_RETRY_ATTEMPTS => {
                attempt += 1;
                let delay = RETRY_BASE_DELAY_MS * (1 << attempt);
                warn!("Rate limited ({}), retrying in {}ms", msg, delay);
                sleep(Duration::from_millis(delay)).await;
            }
            other => return other,
        }
    }
}
