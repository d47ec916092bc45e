//! In-memory checkpoint store
//!
//! Does not survive a restart, so it never satisfies the resumability
//! requirement in production; it exists for tests and dry runs.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::Result;

use super::CheckpointStore;

type PairKey = (String, String);

#[derive(Clone, Default)]
pub struct MemoryCheckpointStore {
    entries: Arc<RwLock<HashMap<PairKey, HashMap<String, String>>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn get(&self, source: &str, dest: &str) -> Result<HashMap<String, String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&(source.to_string(), dest.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn mark_complete(
        &self,
        source: &str,
        dest: &str,
        node_key: &str,
        target_id: &str,
    ) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries
            .entry((source.to_string(), dest.to_string()))
            .or_default()
            .insert(node_key.to_string(), target_id.to_string());
        Ok(())
    }

    async fn has_any(&self, source: &str, dest: &str) -> Result<bool> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&(source.to_string(), dest.to_string()))
            .map(|m| !m.is_empty())
            .unwrap_or(false))
    }

    async fn clear(&self, source: &str, dest: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.remove(&(source.to_string(), dest.to_string()));
        Ok(())
    }
}
