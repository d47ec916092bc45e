//! Durable per-resource completion records
//!
//! A checkpoint marks that one node was already materialized on the
//! destination for a given (source project, destination project) pair.
//! Entries are append-only during a run; a full reset is an explicit,
//! separate operation and is never triggered automatically by a fresh run.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryCheckpointStore;
pub use sqlite::SqliteCheckpointStore;

use std::collections::HashMap;

use crate::error::Result;

/// Durable key-value record of completed nodes, keyed by the ordered
/// (source, destination) project pair
#[async_trait::async_trait]
pub trait CheckpointStore: Send + Sync {
    /// All completed node keys for the pair, with the target id each node
    /// was actually assigned
    async fn get(&self, source: &str, dest: &str) -> Result<HashMap<String, String>>;

    /// Record one node as materialized; replaces any stale entry under the
    /// same key
    async fn mark_complete(
        &self,
        source: &str,
        dest: &str,
        node_key: &str,
        target_id: &str,
    ) -> Result<()>;

    /// Whether any node was ever completed for the pair
    async fn has_any(&self, source: &str, dest: &str) -> Result<bool>;

    /// Explicit full reset for the pair
    async fn clear(&self, source: &str, dest: &str) -> Result<()>;
}
