//! Archive codec for backup and restore
//!
//! A backup walks the same resource tree as the scanner and serializes it
//! into one immutable zip artifact: a JSON manifest plus (if selected)
//! embedded file and function-source payloads. The artifact lives in a
//! dedicated, lazily-provisioned bucket. Restore unpacks the artifact and
//! feeds the unchanged transfer executor, with an [`ArchiveSource`] adapter
//! standing in for the source project.

pub mod source;
pub mod types;

pub use source::ArchiveSource;
pub use types::*;

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::checkpoint::CheckpointStore;
use crate::client::types::FileEntry;
use crate::client::{list_all, Bucket, ProjectClient};
use crate::error::{MigrateError, Result};
use crate::executor::{RunReport, TransferExecutor};
use crate::plan::PlanOptions;

/// Well-known bucket holding backup artifacts; created on first use
pub const BACKUP_BUCKET_ID: &str = "project-backups";

const BACKUP_BUCKET_NAME: &str = "Project backups";
const MANIFEST_PATH: &str = "manifest.json";

/// Serialize the project into one archive and upload it
pub async fn pack(client: &dyn ProjectClient, options: &PlanOptions) -> Result<BackupSummary> {
    info!("Packing backup of project {}", client.project_id());

    let manifest = build_manifest(client, options).await?;

    let mut payloads: Vec<(String, Vec<u8>)> = Vec::new();
    if options.include_files {
        for bucket in &manifest.buckets {
            for file in &bucket.files {
                let content = client.download_file(&bucket.bucket.id, &file.id).await?;
                payloads.push((payload_path_file(&bucket.bucket.id, &file.id), content));
            }
        }
    }
    if options.include_function_code {
        for function in &manifest.functions {
            match client.download_function_code(&function.id).await {
                Ok(code) => payloads.push((payload_path_function(&function.id), code)),
                // Functions with no deployment simply have no payload entry
                Err(MigrateError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
    }

    let bytes = write_archive(&manifest, &payloads)?;
    let sha256_hex = hex_digest(&bytes);

    ensure_backup_bucket(client).await?;

    let created_at = Utc::now();
    let file_id = format!("backup-{}", created_at.format("%Y%m%d-%H%M%S"));
    let name = format!("{}-{}.zip", client.project_id(), created_at.format("%Y%m%d-%H%M%S"));
    let entry = FileEntry {
        id: file_id.clone(),
        bucket_id: BACKUP_BUCKET_ID.to_string(),
        name: name.clone(),
        size: bytes.len() as u64,
    };
    client.upload_file(&entry, bytes.clone()).await?;

    info!(
        "Backup {} uploaded ({} bytes, sha256 {})",
        file_id,
        bytes.len(),
        sha256_hex
    );

    Ok(BackupSummary {
        file_id,
        bucket_id: BACKUP_BUCKET_ID.to_string(),
        name,
        size_bytes: bytes.len() as u64,
        sha256_hex,
        created_at,
    })
}

/// Reconstruct manifest and payloads from archive bytes
pub fn unpack(bytes: &[u8]) -> Result<RestoreBundle> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| MigrateError::Archive(format!("unreadable archive: {}", e)))?;

    let manifest: ArchiveManifest = {
        let mut entry = archive
            .by_name(MANIFEST_PATH)
            .map_err(|e| MigrateError::Archive(format!("missing manifest: {}", e)))?;
        let mut raw = String::new();
        entry.read_to_string(&mut raw)?;
        serde_json::from_str(&raw)?
    };

    if manifest.version != ARCHIVE_VERSION {
        return Err(MigrateError::Archive(format!(
            "unsupported archive version {}",
            manifest.version
        )));
    }

    let mut payloads = HashMap::new();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| MigrateError::Archive(e.to_string()))?;
        if !entry.is_file() || entry.name() == MANIFEST_PATH {
            continue;
        }
        let mut content = Vec::new();
        entry.read_to_end(&mut content)?;
        payloads.insert(entry.name().to_string(), content);
    }

    debug!(
        "Unpacked archive of project {} ({} payload entries)",
        manifest.project_id,
        payloads.len()
    );

    Ok(RestoreBundle { manifest, payloads })
}

/// Download an archive artifact by id
pub async fn fetch(client: &dyn ProjectClient, file_id: &str) -> Result<Vec<u8>> {
    client.download_file(BACKUP_BUCKET_ID, file_id).await
}

/// List backup artifacts; an absent backup bucket just means none exist yet
pub async fn list(client: &dyn ProjectClient) -> Result<Vec<FileEntry>> {
    match client.get_bucket(BACKUP_BUCKET_ID).await {
        Ok(_) => list_all(|cursor| client.list_files(BACKUP_BUCKET_ID, cursor)).await,
        Err(MigrateError::NotFound(_)) => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// Restore a bundle into the project, reusing the executor's dependency
/// ordering and fail-fast semantics unchanged
///
/// Archives are independent of each other: a restore never consults prior
/// restore checkpoints (`resume` stays off).
pub async fn restore(
    dest: Arc<dyn ProjectClient>,
    bundle: RestoreBundle,
    checkpoints: Arc<dyn CheckpointStore>,
) -> Result<RunReport> {
    let plan = bundle.to_plan();
    let source: Arc<dyn ProjectClient> = Arc::new(ArchiveSource::new(bundle));

    let executor = Arc::new(TransferExecutor::new(source, dest, checkpoints));
    executor.execute(plan, false).await
}

async fn build_manifest(
    client: &dyn ProjectClient,
    options: &PlanOptions,
) -> Result<ArchiveManifest> {
    let mut manifest = ArchiveManifest {
        version: ARCHIVE_VERSION,
        project_id: client.project_id().to_string(),
        created_at: Utc::now(),
        options: options.clone(),
        databases: Vec::new(),
        buckets: Vec::new(),
        functions: Vec::new(),
        teams: Vec::new(),
        users: Vec::new(),
    };

    if options.include_databases {
        for database in list_all(|cursor| client.list_databases(cursor)).await? {
            let mut entry = DatabaseEntry {
                collections: Vec::new(),
                database,
            };
            for collection in
                list_all(|cursor| client.list_collections(&entry.database.id, cursor)).await?
            {
                let documents = if options.include_documents {
                    list_all(|cursor| {
                        client.list_documents(&entry.database.id, &collection.id, cursor)
                    })
                    .await?
                } else {
                    Vec::new()
                };
                entry.collections.push(CollectionEntry {
                    collection,
                    documents,
                });
            }
            manifest.databases.push(entry);
        }
    }

    if options.include_buckets {
        for bucket in list_all(|cursor| client.list_buckets(cursor)).await? {
            // The backup bucket never backs itself up
            if bucket.id == BACKUP_BUCKET_ID {
                continue;
            }
            let files = if options.include_files {
                list_all(|cursor| client.list_files(&bucket.id, cursor)).await?
            } else {
                Vec::new()
            };
            manifest.buckets.push(BucketEntry { bucket, files });
        }
    }

    if options.include_functions {
        manifest.functions = list_all(|cursor| client.list_functions(cursor)).await?;
    }

    if options.include_teams {
        for team in list_all(|cursor| client.list_teams(cursor)).await? {
            let memberships =
                list_all(|cursor| client.list_memberships(&team.id, cursor)).await?;
            manifest.teams.push(TeamEntry { team, memberships });
        }
    }

    if options.include_users {
        manifest.users = list_all(|cursor| client.list_users(cursor)).await?;
    }

    Ok(manifest)
}

fn write_archive(manifest: &ArchiveManifest, payloads: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    writer
        .start_file(MANIFEST_PATH, options)
        .map_err(|e| MigrateError::Archive(e.to_string()))?;
    writer.write_all(&serde_json::to_vec_pretty(manifest)?)?;

    for (path, content) in payloads {
        writer
            .start_file(path.as_str(), options)
            .map_err(|e| MigrateError::Archive(e.to_string()))?;
        writer.write_all(content)?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| MigrateError::Archive(e.to_string()))?;
    Ok(cursor.into_inner())
}

async fn ensure_backup_bucket(client: &dyn ProjectClient) -> Result<()> {
    match client.get_bucket(BACKUP_BUCKET_ID).await {
        Ok(_) => Ok(()),
        Err(MigrateError::NotFound(_)) => {
            debug!("Provisioning backup bucket {}", BACKUP_BUCKET_ID);
            client
                .create_bucket(&Bucket {
                    id: BACKUP_BUCKET_ID.to_string(),
                    name: BACKUP_BUCKET_NAME.to_string(),
                    permissions: Vec::new(),
                })
                .await
        }
        Err(e) => Err(e),
    }
}

pub(crate) fn payload_path_file(bucket_id: &str, file_id: &str) -> String {
    format!("files/{}/{}", bucket_id, file_id)
}

pub(crate) fn payload_path_function(function_id: &str) -> String {
    format!("functions/{}/code", function_id)
}

fn hex_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
