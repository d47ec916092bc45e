//! Proxy worker integration
//!
//! An optionally-deployed, short-lived platform function that streams binary
//! payloads directly between the two projects, so the controlling process is
//! not a bandwidth relay. The executor submits transfer tasks as function
//! executions and awaits completion by polling; it never holds a data
//! connection open for the duration of a transfer.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info};
use uuid::Uuid;

use crate::client::types::{ExecutionStatus, Function};
use crate::client::ProjectClient;
use crate::error::{MigrateError, Result};

/// Runtime requested for the deployed worker
pub const WORKER_RUNTIME: &str = "node-18.0";

/// Single-file worker source shipped with the crate
const WORKER_SOURCE: &str = include_str!("worker.js");

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_POLL_ATTEMPTS: u32 = 600;

/// Which of the two projects hosts the worker
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProxyRole {
    Source,
    Destination,
}

impl std::fmt::Display for ProxyRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProxyRole::Source => write!(f, "source"),
            ProxyRole::Destination => write!(f, "destination"),
        }
    }
}

/// Connection details for one side of a transfer, as seen by the worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteRef {
    pub endpoint: String,
    pub project_id: String,
    pub api_key: String,
}

/// One payload transfer submitted to the worker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransferTask {
    File {
        source: RemoteRef,
        dest: RemoteRef,
        bucket_id: String,
        file_id: String,
        dest_bucket_id: String,
        dest_file_id: String,
        file_name: String,
    },
    FunctionCode {
        source: RemoteRef,
        dest: RemoteRef,
        function_id: String,
        dest_function_id: String,
    },
}

/// Handle to a deployed transfer worker
pub struct ProxyWorker {
    host: Arc<dyn ProjectClient>,
    function_id: String,
}

impl std::fmt::Debug for ProxyWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyWorker")
            .field("function_id", &self.function_id)
            .finish_non_exhaustive()
    }
}

impl ProxyWorker {
    /// Provision the worker function in the hosting project
    ///
    /// Deploy failure is surfaced as `ProxyUnavailable`; the caller decides
    /// what to do with it, the engine never silently switches strategies.
    pub async fn deploy(host: Arc<dyn ProjectClient>, role: ProxyRole) -> Result<Self> {
        let function_id = format!("transfer-worker-{}", &Uuid::new_v4().to_string()[..8]);

        let function = Function {
            id: function_id.clone(),
            name: "Transfer worker".to_string(),
            runtime: WORKER_RUNTIME.to_string(),
            entrypoint: "index.js".to_string(),
        };

        host.create_function(&function)
            .await
            .map_err(|e| MigrateError::ProxyUnavailable(format!("deploy failed: {}", e)))?;
        host.deploy_function_code(&function_id, WORKER_SOURCE.as_bytes().to_vec())
            .await
            .map_err(|e| MigrateError::ProxyUnavailable(format!("deploy failed: {}", e)))?;

        info!(
            "Deployed proxy worker {} into the {} project",
            function_id, role
        );

        Ok(Self { host, function_id })
    }

    /// Submit one transfer task and await its completion
    pub async fn invoke(&self, task: &TransferTask) -> Result<()> {
        let payload = serde_json::to_value(task)?;
        let mut execution = self
            .host
            .create_execution(&self.function_id, payload)
            .await
            .map_err(|e| MigrateError::ProxyUnavailable(format!("invoke failed: {}", e)))?;

        let mut attempts = 0;
        loop {
            match execution.status {
                ExecutionStatus::Completed => {
                    debug!("Proxy transfer {} completed", execution.id);
                    return Ok(());
                }
                ExecutionStatus::Failed => {
                    return Err(MigrateError::ProxyUnavailable(format!(
                        "worker transfer failed: {}",
                        execution.stderr
                    )));
                }
                ExecutionStatus::Waiting | ExecutionStatus::Processing => {
                    if attempts >= MAX_POLL_ATTEMPTS {
                        return Err(MigrateError::ProxyUnavailable(
                            "worker transfer timed out".to_string(),
                        ));
                    }
                    attempts += 1;
                    sleep(POLL_INTERVAL).await;
                    execution = self
                        .host
                        .get_execution(&self.function_id, &execution.id)
                        .await
                        .map_err(|e| {
                            MigrateError::ProxyUnavailable(format!("poll failed: {}", e))
                        })?;
                }
            }
        }
    }
}
