//! Resource scanner
//!
//! Enumerates a source project into a migration plan. Every listing is
//! drained through internal pagination, so callers never see partial pages,
//! and any failure aborts before a plan is returned: there is no partial
//! plan.

use tracing::{debug, info};

use crate::client::{list_all, ProjectClient};
use crate::error::{MigrateError, Result};
use crate::plan::{MigrationPlan, PlanOptions, ResourceKind, ResourceNode};

/// Enumerate the source project per the scan-time options
///
/// Nodes default to the identity mapping (`target_id = source_id`); the plan
/// editor may change that before execution.
pub async fn scan(client: &dyn ProjectClient, options: &PlanOptions) -> Result<MigrationPlan> {
    info!("Scanning project {}", client.project_id());

    let mut plan = MigrationPlan::new(client.project_id(), options.clone());

    if options.include_databases {
        let databases = list_all(|cursor| client.list_databases(cursor))
            .await
            .map_err(scan_error)?;
        for database in databases {
            let mut node = ResourceNode::new(ResourceKind::Database, &database.id, &database.name);
            let collections = list_all(|cursor| client.list_collections(&database.id, cursor))
                .await
                .map_err(scan_error)?;
            node.children = collections
                .into_iter()
                .map(|c| ResourceNode::new(ResourceKind::Collection, &c.id, &c.name))
                .collect();
            debug!(
                "Scanned database {} with {} collections",
                node.source_id,
                node.children.len()
            );
            plan.databases.push(node);
        }
    }

    if options.include_buckets {
        let buckets = list_all(|cursor| client.list_buckets(cursor))
            .await
            .map_err(scan_error)?;
        plan.buckets = buckets
            .into_iter()
            .map(|b| ResourceNode::new(ResourceKind::Bucket, &b.id, &b.name))
            .collect();
    }

    if options.include_functions {
        let functions = list_all(|cursor| client.list_functions(cursor))
            .await
            .map_err(scan_error)?;
        plan.functions = functions
            .into_iter()
            .map(|f| ResourceNode::new(ResourceKind::Function, &f.id, &f.name))
            .collect();
    }

    if options.include_teams {
        let teams = list_all(|cursor| client.list_teams(cursor))
            .await
            .map_err(scan_error)?;
        plan.teams = teams
            .into_iter()
            .map(|t| ResourceNode::new(ResourceKind::Team, &t.id, &t.name))
            .collect();
    }

    if options.include_users {
        let users = list_all(|cursor| client.list_users(cursor))
            .await
            .map_err(scan_error)?;
        plan.users = users
            .into_iter()
            .map(|u| ResourceNode::new(ResourceKind::User, &u.id, &u.name))
            .collect();
    }

    info!(
        "Scan of {} found {} top-level resources",
        client.project_id(),
        plan.total_top_level()
    );

    Ok(plan)
}

/// Scan failures are a distinct condition from execution errors
fn scan_error(err: MigrateError) -> MigrateError {
    match err {
        MigrateError::Scan(_) => err,
        other => MigrateError::Scan(other.to_string()),
    }
}
