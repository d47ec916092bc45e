//! Error types for the migration engine

use thiserror::Error;

use crate::plan::ResourceKind;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, MigrateError>;

/// Migration engine error types
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Source project could not be enumerated (unreachable or unauthorized).
    /// No plan is produced when this is raised.
    #[error("Scan failed: {0}")]
    Scan(String),

    /// A single destination write failed; the run aborts and checkpoints
    /// recorded so far are preserved for a resumed run.
    #[error("Failed to create {kind} '{id}': {reason}")]
    Creation {
        kind: ResourceKind,
        id: String,
        reason: String,
    },

    /// User cancellation observed at a node boundary
    #[error("Run stopped by user")]
    ForceStopped,

    /// Proxy worker could not be deployed or invoked while the cloud proxy
    /// strategy was requested
    #[error("Proxy worker unavailable: {0}")]
    ProxyUnavailable(String),

    /// Remote rate limiting; retried with backoff before becoming fatal
    #[error("Rate limited by remote: {0}")]
    RateLimited(String),

    /// Remote resource missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Remote rejected a write because the identifier already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Remote API call failed for any other reason
    #[error("Remote error: {0}")]
    Remote(String),

    /// Authorization rejected by the remote
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Archive could not be written or read back
    #[error("Archive error: {0}")]
    Archive(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Checkpoint database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
