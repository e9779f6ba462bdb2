//! Playlist Storage using SQLite

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::PlaylistStore,
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    Row,
};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::debug;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS playlists (
        name TEXT PRIMARY KEY,
        tracks TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )
"#;

/// SQLite-backed playlist store
///
/// One row per playlist; the track set is stored as a JSON array. `put`
/// overwrites the whole row, so concurrent writers follow last-write-wins.
pub struct SqlitePlaylistStore {
    pool: SqlitePool,
}

impl SqlitePlaylistStore {
    /// Open (or create) the store at `db_path`
    pub async fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(BridgeError::Io)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to connect to DB: {}", e)))?;

        Self::init(&pool).await?;
        debug!(path = ?db_path, "Initialized playlist store");

        Ok(Self { pool })
    }

    /// Create an in-memory store (for testing)
    pub async fn in_memory() -> Result<Self> {
        // Every connection to :memory: is a separate database; keep one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to connect to DB: {}", e)))?;

        Self::init(&pool).await?;
        Ok(Self { pool })
    }

    async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(CREATE_TABLE)
            .execute(pool)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to create table: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl PlaylistStore for SqlitePlaylistStore {
    async fn get(&self, name: &str) -> Result<Option<BTreeSet<String>>> {
        let row = sqlx::query("SELECT tracks FROM playlists WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to read playlist: {}", e)))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let encoded: String = row.get("tracks");
        let tracks = serde_json::from_str(&encoded).map_err(|e| {
            BridgeError::DatabaseError(format!("Corrupt playlist {}: {}", name, e))
        })?;
        Ok(Some(tracks))
    }

    async fn put(&self, name: &str, tracks: BTreeSet<String>) -> Result<()> {
        let encoded = serde_json::to_string(&tracks)
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to encode playlist: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO playlists (name, tracks, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                tracks = excluded.tracks,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(name)
        .bind(encoded)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::DatabaseError(format!("Failed to write playlist: {}", e)))?;

        debug!(playlist = name, tracks = tracks.len(), "Stored playlist");
        Ok(())
    }

    async fn list_names(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT name FROM playlists ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to list playlists: {}", e)))?;

        Ok(rows.iter().map(|row| row.get("name")).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[tokio::test]
    async fn missing_playlist_is_none() {
        let store = SqlitePlaylistStore::in_memory().await.unwrap();
        assert_eq!(store.get("nothing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_replaces_the_whole_set() {
        let store = SqlitePlaylistStore::in_memory().await.unwrap();

        store.put("road", set(&["/a.mp3", "/b.mp3"])).await.unwrap();
        store.put("road", set(&["/c.mp3"])).await.unwrap();

        assert_eq!(store.get("road").await.unwrap(), Some(set(&["/c.mp3"])));
    }

    #[tokio::test]
    async fn empty_playlist_round_trips() {
        let store = SqlitePlaylistStore::in_memory().await.unwrap();
        store.put("new", BTreeSet::new()).await.unwrap();
        assert_eq!(store.get("new").await.unwrap(), Some(BTreeSet::new()));
    }

    #[tokio::test]
    async fn names_are_listed_in_order() {
        let store = SqlitePlaylistStore::in_memory().await.unwrap();
        store.put("zulu", BTreeSet::new()).await.unwrap();
        store.put("alpha", set(&["/x.mp3"])).await.unwrap();

        assert_eq!(store.list_names().await.unwrap(), vec!["alpha", "zulu"]);
    }

    #[tokio::test]
    async fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("playlists.db");

        {
            let store = SqlitePlaylistStore::new(path.clone()).await.unwrap();
            store.put("kept", set(&["/song.mp3"])).await.unwrap();
        }

        let reopened = SqlitePlaylistStore::new(path).await.unwrap();
        assert_eq!(reopened.get("kept").await.unwrap(), Some(set(&["/song.mp3"])));
    }
}
