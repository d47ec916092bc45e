use migrate_rs::checkpoint::{CheckpointStore, SqliteCheckpointStore};
use tempfile::TempDir;

fn database_url(dir: &TempDir) -> String {
    format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("checkpoints.db").display()
    )
}

#[tokio::test]
async fn entries_survive_reopening_the_store() {
    let dir = TempDir::new().unwrap();
    let url = database_url(&dir);

    {
        let store = SqliteCheckpointStore::new(&url).await.unwrap();
        store
            .mark_complete("src", "dst", "database:db-a", "db-a")
            .await
            .unwrap();
        store
            .mark_complete("src", "dst", "collection:db-a/col-1", "col-1")
            .await
            .unwrap();
    }

    // A new store over the same file sees the same entries, which is what a
    // resumed run after an application restart relies on
    let store = SqliteCheckpointStore::new(&url).await.unwrap();
    assert!(store.has_any("src", "dst").await.unwrap());

    let entries = store.get("src", "dst").await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries["database:db-a"], "db-a");
}

#[tokio::test]
async fn pairs_are_independent_and_clear_is_scoped() {
    let dir = TempDir::new().unwrap();
    let store = SqliteCheckpointStore::new(&database_url(&dir)).await.unwrap();

    store
        .mark_complete("src", "dst-1", "user:u-1", "u-1")
        .await
        .unwrap();
    store
        .mark_complete("src", "dst-2", "user:u-1", "u-1")
        .await
        .unwrap();

    assert!(store.has_any("src", "dst-1").await.unwrap());
    assert!(store.has_any("src", "dst-2").await.unwrap());
    assert!(!store.has_any("dst-1", "src").await.unwrap());

    store.clear("src", "dst-1").await.unwrap();
    assert!(!store.has_any("src", "dst-1").await.unwrap());
    assert!(store.has_any("src", "dst-2").await.unwrap());
}

#[tokio::test]
async fn mark_complete_replaces_the_assigned_target() {
    let dir = TempDir::new().unwrap();
    let store = SqliteCheckpointStore::new(&database_url(&dir)).await.unwrap();

    store
        .mark_complete("src", "dst", "bucket:avatars", "avatars")
        .await
        .unwrap();
    store
        .mark_complete("src", "dst", "bucket:avatars", "avatars-v2")
        .await
        .unwrap();

    let entries = store.get("src", "dst").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries["bucket:avatars"], "avatars-v2");
}
