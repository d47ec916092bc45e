//! Executor types
//!
//! Run status and the report handed back when a run reaches a terminal
//! state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State of a transfer run
///
/// A run's terminal status is always exactly one of `Completed`, `Stopped`
/// or `Failed`, so callers can distinguish user-initiated interruption from
/// failure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run is executing
    Running,
    /// Every enabled node was processed
    Completed,
    /// Cancellation was observed at a node boundary
    Stopped,
    /// A creation failed; checkpoints recorded so far are preserved
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Stopped => write!(f, "stopped"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of one transfer run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique ID of this run
    pub run_id: String,
    pub status: RunStatus,
    /// Nodes materialized on the destination during this run
    pub created: u64,
    /// Nodes skipped because a checkpoint already marked them complete
    pub skipped: u64,
    /// Error message when status is Failed
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
