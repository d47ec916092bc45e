//! migrate-rs: cross-project migration and backup engine
//!
//! The transfer subsystem of the operator console for a multi-tenant
//! backend platform: enumerate a source project's resources into an
//! editable plan, execute that plan against a second project, and back
//! up/restore a single project through one portable archive.
//!
//! # Features
//!
//! - **Scanner**: paginated enumeration of databases, collections, buckets,
//!   functions, teams and users into a [`plan::MigrationPlan`]
//! - **Executor**: dependency-ordered, fail-fast transfer with durable
//!   per-resource checkpoints and cooperative cancellation
//! - **Resumability**: interrupted runs continue past completed nodes
//!   without duplicating work
//! - **Proxy worker**: optional deployed function streaming payloads
//!   server-to-server instead of relaying through this process
//! - **Archive codec**: single-file zip backups with embedded payloads
//!
//! # Example
//!
//! ```no_run
//! use migrate_rs::checkpoint::SqliteCheckpointStore;
//! use migrate_rs::client::{HttpProjectClient, ProjectClient};
//! use migrate_rs::config::Config;
//! use migrate_rs::executor::TransferExecutor;
//! use migrate_rs::plan::PlanOptions;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let source: Arc<dyn ProjectClient> =
//!         Arc::new(HttpProjectClient::new(&config.source));
//!     let dest: Arc<dyn ProjectClient> =
//!         Arc::new(HttpProjectClient::new(config.destination.as_ref().unwrap()));
//!     let checkpoints = Arc::new(SqliteCheckpointStore::new("sqlite://migrate.db?mode=rwc").await?);
//!
//!     let plan = migrate_rs::scanner::scan(source.as_ref(), &PlanOptions::default()).await?;
//!     let executor = Arc::new(TransferExecutor::new(source, dest, checkpoints));
//!     let report = executor.execute(plan, false).await?;
//!     println!("run finished: {}", report.status);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`plan`]: plan model and cascading enablement
//! - [`scanner`]: source enumeration
//! - [`executor`]: plan execution, checkpointing, cancellation
//! - [`checkpoint`]: durable completion records
//! - [`proxy`]: deployed transfer worker integration
//! - [`archive`]: backup/restore codec
//! - [`client`]: platform API seam and implementations

pub mod archive;
pub mod checkpoint;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod plan;
pub mod proxy;
pub mod scanner;

// Re-export commonly used types
pub use config::Config;
pub use error::{MigrateError, Result};
pub use executor::{RunReport, RunStatus, TransferExecutor};
pub use plan::{MigrationPlan, PlanOptions};
