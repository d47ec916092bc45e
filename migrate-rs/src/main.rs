use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use migrate_rs::archive;
use migrate_rs::checkpoint::{CheckpointStore, SqliteCheckpointStore};
use migrate_rs::client::{HttpProjectClient, ProjectClient};
use migrate_rs::config::{Config, ProjectConfig};
use migrate_rs::executor::TransferExecutor;
use migrate_rs::plan::{MigrationPlan, PlanOptions, ResourceNode};
use migrate_rs::proxy::{ProxyRole, ProxyWorker, RemoteRef};
use migrate_rs::scanner;

#[derive(Parser)]
#[command(name = "migrate", about = "Cross-project migration and backup engine")]
struct Cli {
    /// Path of the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Enumerate the source project and print the proposed plan
    Scan,
    /// Scan the source project and execute the full plan against the
    /// destination
    Run {
        /// Skip nodes already checkpointed for this source/destination pair
        #[arg(long)]
        resume: bool,
    },
    /// Pack the source project into a backup archive
    Backup,
    /// List backup archives
    Backups,
    /// Restore a backup archive into the source project
    Restore {
        /// Archive file id, as listed by `backups`
        file_id: String,
    },
    /// Inspect or clear checkpoints for the configured pair
    Checkpoints {
        /// Remove every checkpoint for the pair
        #[arg(long)]
        clear: bool,
    },
}

fn remote_ref(config: &ProjectConfig) -> RemoteRef {
    RemoteRef {
        endpoint: config.endpoint.clone(),
        project_id: config.project_id.clone(),
        api_key: config.api_key.clone(),
    }
}

fn print_group(label: &str, nodes: &[ResourceNode]) {
    if nodes.is_empty() {
        return;
    }
    println!("{} ({}):", label, nodes.len());
    for node in nodes {
        let marker = if node.enabled { "+" } else { "-" };
        println!("  {} {} -> {}", marker, node.source_id, node.target_id);
        for child in &node.children {
            let marker = if child.enabled { "+" } else { "-" };
            println!("    {} {} -> {}", marker, child.source_id, child.target_id);
        }
    }
}

fn print_plan(plan: &MigrationPlan) {
    print_group("Databases", &plan.databases);
    print_group("Buckets", &plan.buckets);
    print_group("Functions", &plan.functions);
    print_group("Teams", &plan.teams);
    print_group("Users", &plan.users);
    println!(
        "{} of {} top-level resources enabled",
        plan.enabled_top_level(),
        plan.total_top_level()
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration before logging so the level applies from the start
    let config = if std::path::Path::new(&cli.config).exists() {
        Config::from_file(&cli.config)?
    } else {
        Config::default()
    };

    let level = config
        .logging
        .level
        .parse::<Level>()
        .unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    let source: Arc<dyn ProjectClient> = Arc::new(HttpProjectClient::new(&config.source));
    let options = PlanOptions::from(&config.transfer);

    match cli.command {
        Command::Scan => {
            let plan = scanner::scan(source.as_ref(), &options).await?;
            print_plan(&plan);
        }

        Command::Run { resume } => {
            let dest_config = config
                .destination
                .as_ref()
                .ok_or("no [destination] configured")?;
            let dest: Arc<dyn ProjectClient> = Arc::new(HttpProjectClient::new(dest_config));
            let checkpoints: Arc<dyn CheckpointStore> =
                Arc::new(SqliteCheckpointStore::new(&config.transfer.checkpoint_db).await?);

            let plan = scanner::scan(source.as_ref(), &options).await?;
            print_plan(&plan);

            let mut executor = TransferExecutor::new(source.clone(), dest.clone(), checkpoints)
                .with_leaf_concurrency(config.transfer.leaf_concurrency);

            if config.transfer.use_cloud_proxy {
                info!("Deploying proxy worker to the destination project");
                let worker = ProxyWorker::deploy(dest.clone(), ProxyRole::Destination).await?;
                executor = executor.with_proxy(
                    worker,
                    remote_ref(&config.source),
                    remote_ref(dest_config),
                );
            }

            let executor = Arc::new(executor);
            if !resume && executor.has_prior_checkpoint().await? {
                warn!("Prior checkpoints exist for this pair; pass --resume to skip completed nodes");
            }

            let report = executor.execute(plan, resume).await?;
            println!(
                "Run {}: {} ({} created, {} skipped)",
                report.run_id, report.status, report.created, report.skipped
            );
            if let Some(error) = report.error {
                println!("Error: {}", error);
                println!("Completed nodes are checkpointed; re-run with --resume to continue");
            }
        }

        Command::Backup => {
            let summary = archive::pack(source.as_ref(), &options).await?;
            println!(
                "Backup {} uploaded to bucket {} ({} bytes, sha256 {})",
                summary.file_id, summary.bucket_id, summary.size_bytes, summary.sha256_hex
            );
        }

        Command::Backups => {
            let archives = archive::list(source.as_ref()).await?;
            if archives.is_empty() {
                println!("No backups found");
            }
            for entry in archives {
                println!("{}  {}  {} bytes", entry.id, entry.name, entry.size);
            }
        }

        Command::Restore { file_id } => {
            let checkpoints: Arc<dyn CheckpointStore> =
                Arc::new(SqliteCheckpointStore::new(&config.transfer.checkpoint_db).await?);
            let bytes = archive::fetch(source.as_ref(), &file_id).await?;
            let bundle = archive::unpack(&bytes)?;
            let report = archive::restore(source.clone(), bundle, checkpoints).await?;
            println!(
                "Restore {}: {} ({} created)",
                report.run_id, report.status, report.created
            );
            if let Some(error) = report.error {
                println!("Error: {}", error);
            }
        }

        Command::Checkpoints { clear } => {
            let dest_config = config
                .destination
                .as_ref()
                .ok_or("no [destination] configured")?;
            let checkpoints = SqliteCheckpointStore::new(&config.transfer.checkpoint_db).await?;
            let source_id = &config.source.project_id;
            let dest_id = &dest_config.project_id;

            if clear {
                checkpoints.clear(source_id, dest_id).await?;
                println!("Cleared checkpoints for {} -> {}", source_id, dest_id);
            } else {
                let entries = checkpoints.get(source_id, dest_id).await?;
                println!(
                    "{} checkpointed nodes for {} -> {}",
                    entries.len(),
                    source_id,
                    dest_id
                );
                let mut keys: Vec<_> = entries.keys().collect();
                keys.sort();
                for key in keys {
                    println!("  {}", key);
                }
            }
        }
    }

    Ok(())
}
