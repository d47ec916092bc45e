use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub source: ProjectConfig,
    pub destination: Option<ProjectConfig>,
    pub transfer: TransferConfig,
    pub logging: LoggingConfig,
}

/// Connection credentials for one project: validated only by attempting
/// connection, there is no separate validation call.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProjectConfig {
    pub endpoint: String,
    pub project_id: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransferConfig {
    pub include_databases: bool,
    pub include_documents: bool,
    pub include_buckets: bool,
    pub include_files: bool,
    pub include_functions: bool,
    pub include_function_code: bool,
    pub include_teams: bool,
    pub include_users: bool,
    /// Stream file payloads server-to-server through a deployed proxy
    /// worker instead of relaying bytes through this process
    pub use_cloud_proxy: bool,
    /// Upper bound on concurrent leaf transfers (documents, files)
    pub leaf_concurrency: usize,
    /// Path of the SQLite checkpoint database
    pub checkpoint_db: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::error::MigrateError::Config(e.to_string()))?;

        toml::from_str(&content)
            .map_err(|e| crate::error::MigrateError::Config(e.to_string()))
    }

    pub fn default() -> Self {
        Self {
            source: ProjectConfig {
                endpoint: "https://cloud.example.com/v1".to_string(),
                project_id: "source-project".to_string(),
                api_key: String::new(),
            },
            destination: None,
            transfer: TransferConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            include_databases: true,
            include_documents: true,
            include_buckets: true,
            include_files: true,
            include_functions: true,
            include_function_code: true,
            include_teams: true,
            include_users: true,
            use_cloud_proxy: false,
            leaf_concurrency: 4,
            checkpoint_db: "sqlite://migrate.db?mode=rwc".to_string(),
        }
    }
}
