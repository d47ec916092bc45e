//! Migration plan model
//!
//! The in-memory representation of what will be migrated or backed up and
//! its editable mapping to destination identifiers. The plan editor (UI)
//! mutates `enabled`/`target_id`/`target_name` on nodes between scan and
//! execution; whatever plan state exists when execution starts is what gets
//! migrated.

pub mod types;

pub use types::{MigrationPlan, PlanOptions, ResourceKind, ResourceNode};

/// Build the checkpoint key for a node: kind plus the source-side path.
///
/// Scoped kinds (collections, documents, files, memberships) qualify the id
/// with their parent ids so the key is unique across the whole project.
pub fn node_key(kind: ResourceKind, scope: &[&str], source_id: &str) -> String {
    if scope.is_empty() {
        format!("{}:{}", kind, source_id)
    } else {
        format!("{}:{}/{}", kind, scope.join("/"), source_id)
    }
}
