//! SQLite-backed checkpoint store
//!
//! The durable implementation: survives application restarts, which is what
//! makes resumed runs possible at all.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::Result;

use super::CheckpointStore;

pub struct SqliteCheckpointStore {
    db: SqlitePool,
}

impl SqliteCheckpointStore {
    /// Open (or create) the checkpoint database
    pub async fn new(database_url: &str) -> Result<Self> {
        let db = SqlitePool::connect(database_url).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS checkpoints (
                source_project TEXT NOT NULL,
                dest_project TEXT NOT NULL,
                node_key TEXT NOT NULL,
                target_id TEXT NOT NULL,
                completed_at TEXT NOT NULL,
                PRIMARY KEY (source_project, dest_project, node_key)
            )
            "#,
        )
        .execute(&db)
        .await?;

        Ok(Self { db })
    }
}

#[async_trait::async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn get(&self, source: &str, dest: &str) -> Result<HashMap<String, String>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT node_key, target_id
            FROM checkpoints
            WHERE source_project = ? AND dest_project = ?
            "#,
        )
        .bind(source)
        .bind(dest)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().collect())
    }

    async fn mark_complete(
        &self,
        source: &str,
        dest: &str,
        node_key: &str,
        target_id: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO checkpoints (
                source_project, dest_project, node_key, target_id, completed_at
            ) VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(source)
        .bind(dest)
        .bind(node_key)
        .bind(target_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn has_any(&self, source: &str, dest: &str) -> Result<bool> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM checkpoints WHERE source_project = ? AND dest_project = ?",
        )
        .bind(source)
        .bind(dest)
        .fetch_one(&self.db)
        .await?;

        Ok(count.0 > 0)
    }

    async fn clear(&self, source: &str, dest: &str) -> Result<()> {
        sqlx::query("DELETE FROM checkpoints WHERE source_project = ? AND dest_project = ?")
            .bind(source)
            .bind(dest)
            .execute(&self.db)
            .await?;

        Ok(())
    }
}
