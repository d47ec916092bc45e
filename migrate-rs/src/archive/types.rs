//! Archive types
//!
//! The manifest serialized into every backup artifact, and the bundle a
//! restore works from.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::types::*;
use crate::plan::{MigrationPlan, PlanOptions, ResourceKind, ResourceNode};

/// Current archive format version
pub const ARCHIVE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveManifest {
    pub version: u32,
    pub project_id: String,
    pub created_at: DateTime<Utc>,
    /// Options the backup was taken with
    pub options: PlanOptions,
    pub databases: Vec<DatabaseEntry>,
    pub buckets: Vec<BucketEntry>,
    pub functions: Vec<Function>,
    pub teams: Vec<TeamEntry>,
    pub users: Vec<User>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseEntry {
    pub database: Database,
    pub collections: Vec<CollectionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionEntry {
    pub collection: Collection,
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketEntry {
    pub bucket: Bucket,
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamEntry {
    pub team: Team,
    pub memberships: Vec<Membership>,
}

/// Result of a completed backup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSummary {
    pub file_id: String,
    pub bucket_id: String,
    pub name: String,
    pub size_bytes: u64,
    pub sha256_hex: String,
    pub created_at: DateTime<Utc>,
}

/// An unpacked archive: manifest plus embedded payload bytes keyed by
/// archive entry path
pub struct RestoreBundle {
    pub manifest: ArchiveManifest,
    pub payloads: HashMap<String, Vec<u8>>,
}

impl RestoreBundle {
    /// Plan-like structure feeding the transfer executor; every node is
    /// enabled with the identity mapping
    pub fn to_plan(&self) -> MigrationPlan {
        let mut plan = MigrationPlan::new(&self.manifest.project_id, self.manifest.options.clone());

        for entry in &self.manifest.databases {
            let mut node = ResourceNode::new(
                ResourceKind::Database,
                &entry.database.id,
                &entry.database.name,
            );
            node.children = entry
                .collections
                .iter()
                .map(|c| {
                    ResourceNode::new(ResourceKind::Collection, &c.collection.id, &c.collection.name)
                })
                .collect();
            plan.databases.push(node);
        }

        plan.buckets = self
            .manifest
            .buckets
            .iter()
            .map(|b| ResourceNode::new(ResourceKind::Bucket, &b.bucket.id, &b.bucket.name))
            .collect();
        plan.functions = self
            .manifest
            .functions
            .iter()
            .map(|f| ResourceNode::new(ResourceKind::Function, &f.id, &f.name))
            .collect();
        plan.teams = self
            .manifest
            .teams
            .iter()
            .map(|t| ResourceNode::new(ResourceKind::Team, &t.team.id, &t.team.name))
            .collect();
        plan.users = self
            .manifest
            .users
            .iter()
            .map(|u| ResourceNode::new(ResourceKind::User, &u.id, &u.name))
            .collect();

        plan
    }
}
