//! Plan types
//!
//! Data structures for migration and backup plans.

use serde::{Deserialize, Serialize};

/// Kind of a migratable resource
///
/// `Document`, `File` and `Membership` are leaf payload resources: they are
/// not shown as top-level plan rows but are processed (and checkpointed)
/// during execution under their owning collection, bucket or team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Database,
    Collection,
    Document,
    Bucket,
    File,
    Function,
    Team,
    Membership,
    User,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Database => write!(f, "database"),
            ResourceKind::Collection => write!(f, "collection"),
            ResourceKind::Document => write!(f, "document"),
            ResourceKind::Bucket => write!(f, "bucket"),
            ResourceKind::File => write!(f, "file"),
            ResourceKind::Function => write!(f, "function"),
            ResourceKind::Team => write!(f, "team"),
            ResourceKind::Membership => write!(f, "membership"),
            ResourceKind::User => write!(f, "user"),
        }
    }
}

/// One migratable item and its editable destination mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceNode {
    pub kind: ResourceKind,
    pub source_id: String,
    pub source_name: String,
    /// Destination identifier; must be unique among destination resources of
    /// the same kind once execution runs. The engine does not enforce this
    /// itself; destination-side uniqueness failures surface as execution
    /// errors.
    pub target_id: String,
    pub target_name: String,
    pub enabled: bool,
    /// Child nodes; used for the database -> collection hierarchy only
    pub children: Vec<ResourceNode>,
}

impl ResourceNode {
    /// Create a node with the identity mapping as the default proposal
    pub fn new(kind: ResourceKind, source_id: &str, source_name: &str) -> Self {
        Self {
            kind,
            source_id: source_id.to_string(),
            source_name: source_name.to_string(),
            target_id: source_id.to_string(),
            target_name: source_name.to_string(),
            enabled: true,
            children: Vec::new(),
        }
    }
}

/// Scan-time switches deciding which resource kinds are enumerated
///
/// Consumed once, at scan time; editing options after a scan requires a new
/// scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanOptions {
    pub include_databases: bool,
    pub include_documents: bool,
    pub include_buckets: bool,
    pub include_files: bool,
    pub include_functions: bool,
    pub include_function_code: bool,
    pub include_teams: bool,
    pub include_users: bool,
    /// Delegate payload transfer to a deployed proxy worker
    pub use_cloud_proxy: bool,
}

impl Default for PlanOptions {
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
        }
    }
}

impl From<&crate::config::TransferConfig> for PlanOptions {
    fn from(cfg: &crate::config::TransferConfig) -> Self {
        Self {
            include_databases: cfg.include_databases,
            include_documents: cfg.include_documents,
            include_buckets: cfg.include_buckets,
            include_files: cfg.include_files,
            include_functions: cfg.include_functions,
            include_function_code: cfg.include_function_code,
            include_teams: cfg.include_teams,
            include_users: cfg.include_users,
            use_cloud_proxy: cfg.use_cloud_proxy,
        }
    }
}

/// A named collection of top-level resource nodes, one list per top-level
/// kind, plus the options that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationPlan {
    pub name: String,
    pub options: PlanOptions,
    pub databases: Vec<ResourceNode>,
    pub buckets: Vec<ResourceNode>,
    pub functions: Vec<ResourceNode>,
    pub teams: Vec<ResourceNode>,
    pub users: Vec<ResourceNode>,
}

impl MigrationPlan {
    pub fn new(name: &str, options: PlanOptions) -> Self {
        Self {
            name: name.to_string(),
            options,
            databases: Vec::new(),
            buckets: Vec::new(),
            functions: Vec::new(),
            teams: Vec::new(),
            users: Vec::new(),
        }
    }

    fn group_mut(&mut self, kind: ResourceKind) -> Option<&mut Vec<ResourceNode>> {
        match kind {
            ResourceKind::Database => Some(&mut self.databases),
            ResourceKind::Bucket => Some(&mut self.buckets),
            ResourceKind::Function => Some(&mut self.functions),
            ResourceKind::Team => Some(&mut self.teams),
            ResourceKind::User => Some(&mut self.users),
            _ => None,
        }
    }

    /// Toggle a top-level node, cascading the new value onto every direct
    /// child node.
    ///
    /// The cascade unconditionally overwrites each child's prior enabled
    /// state, in both directions. It is applied once, synchronously, on the
    /// toggle; it is the only automatic cross-node mutation.
    ///
    /// Returns false when no node with the given id exists.
    pub fn set_enabled(&mut self, kind: ResourceKind, source_id: &str, enabled: bool) -> bool {
        let Some(group) = self.group_mut(kind) else {
            return false;
        };
        let Some(node) = group.iter_mut().find(|n| n.source_id == source_id) else {
            return false;
        };
        node.enabled = enabled;
        for child in &mut node.children {
            child.enabled = enabled;
        }
        true
    }

    /// Toggle one child of a top-level node without touching its siblings
    pub fn set_child_enabled(
        &mut self,
        kind: ResourceKind,
        parent_id: &str,
        child_id: &str,
        enabled: bool,
    ) -> bool {
        let Some(group) = self.group_mut(kind) else {
            return false;
        };
        let Some(parent) = group.iter_mut().find(|n| n.source_id == parent_id) else {
            return false;
        };
        let Some(child) = parent
            .children
            .iter_mut()
            .find(|c| c.source_id == child_id)
        else {
            return false;
        };
        child.enabled = enabled;
        true
    }

    /// Number of enabled top-level nodes across all groups
    pub fn enabled_top_level(&self) -> usize {
        [
            &self.databases,
            &self.buckets,
            &self.functions,
            &self.teams,
            &self.users,
        ]
        .iter()
        .map(|group| group.iter().filter(|n| n.enabled).count())
        .sum()
    }

    /// Total number of top-level nodes across all groups
    pub fn total_top_level(&self) -> usize {
        self.databases.len()
            + self.buckets.len()
            + self.functions.len()
            + self.teams.len()
            + self.users.len()
    }
}
