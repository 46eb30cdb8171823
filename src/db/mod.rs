//! Database connection and operations

pub mod file_metadata;
pub mod index_state;
pub mod library_index;
pub mod natural_sort;
pub mod sqlite_helpers;

use std::str::FromStr;

use anyhow::Result;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

pub use file_metadata::{FileMetadataRecord, FileMetadataRepository, UpsertFileMetadata};
pub use index_state::IndexStateRepository;
pub use library_index::{
    CreateIndexEntry, IndexEntryRecord, LibraryIndexRepository, LibraryQuery, SortKey,
};

/// Database wrapper providing connection pool access
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Get the maximum connection pool size from environment or default
    fn get_max_connections() -> u32 {
        std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10)
    }

    /// Create a new database connection pool with the natural-sort
    /// collation registered on every connection
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .collation(natural_sort::COLLATION_NAME, |a, b| {
                natural_sort::natural_cmp(a, b)
            });

        let pool = SqlitePoolOptions::new()
            .max_connections(Self::get_max_connections())
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get a library index repository
    pub fn library_index(&self) -> LibraryIndexRepository {
        LibraryIndexRepository::new(self.pool.clone())
    }

    /// Get a file metadata repository
    pub fn file_metadata(&self) -> FileMetadataRepository {
        FileMetadataRepository::new(self.pool.clone())
    }

    /// Get an index build state repository
    pub fn index_state(&self) -> IndexStateRepository {
        IndexStateRepository::new(self.pool.clone())
    }

    /// Create the schema if it does not exist yet
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS library_index (
                path TEXT PRIMARY KEY,
                category TEXT NOT NULL,
                name TEXT NOT NULL,
                folder TEXT NOT NULL DEFAULT '',
                source TEXT NOT NULL DEFAULT 'local',
                poster TEXT,
                mtime REAL,
                size INTEGER,
                genre TEXT,
                year TEXT,
                indexed_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_library_index_category ON library_index(category)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS library_index_state (
                category TEXT PRIMARY KEY,
                scanned_at TEXT NOT NULL,
                item_count INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS file_metadata (
                path TEXT PRIMARY KEY,
                media_type TEXT,
                title TEXT,
                year TEXT,
                imdb_id TEXT,
                poster TEXT,
                plot TEXT,
                rated TEXT,
                runtime TEXT,
                genre TEXT,
                meta_json TEXT,
                fetched_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::Category;

    // file-backed db: pooled in-memory connections would not share state
    async fn test_db(dir: &tempfile::TempDir) -> Database {
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
        let db = Database::connect(&url).await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    fn entry(path: &str, name: &str, size: i64) -> CreateIndexEntry {
        CreateIndexEntry {
            path: path.to_string(),
            category: Category::Movies,
            name: name.to_string(),
            folder: String::new(),
            source: "local".to_string(),
            poster: None,
            mtime: Some(1000.0),
            size: Some(size),
            genre: None,
            year: None,
        }
    }

    #[tokio::test]
    async fn test_query_uses_natural_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir).await;
        let repo = db.library_index();

        repo.upsert_batch(&[
            entry("/data/movies/Episode 10.mkv", "Episode 10.mkv", 1),
            entry("/data/movies/Episode 2.mkv", "Episode 2.mkv", 1),
            entry("/data/movies/Episode 1.mkv", "Episode 1.mkv", 1),
        ])
        .await
        .unwrap();

        let (items, total) = repo
            .query(Category::Movies, &LibraryQuery {
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 3);
        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Episode 1.mkv", "Episode 2.mkv", "Episode 10.mkv"]
        );
    }

    #[tokio::test]
    async fn test_clear_category_is_scoped() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir).await;
        let repo = db.library_index();

        repo.upsert(&entry("/data/movies/a.mkv", "a.mkv", 1))
            .await
            .unwrap();
        let mut show = entry("/data/shows/b.mkv", "b.mkv", 1);
        show.category = Category::Shows;
        repo.upsert(&show).await.unwrap();

        repo.clear_category(Category::Movies).await.unwrap();
        assert_eq!(repo.count_category(Category::Movies).await.unwrap(), 0);
        assert_eq!(repo.count_category(Category::Shows).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicates_need_matching_name_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir).await;
        let repo = db.library_index();

        repo.upsert_batch(&[
            entry("/data/movies/Alien (1979)/Alien.mkv", "Alien.mkv", 700),
            entry("/data/movies/dupes/Alien.mkv", "Alien.mkv", 700),
            entry("/data/movies/other/Alien.mkv", "Alien.mkv", 900),
        ])
        .await
        .unwrap();

        let groups = repo.find_duplicate_files().await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].size, 700);
        assert_eq!(groups[0].paths.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_path_counts_actual_rows() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir).await;
        let repo = db.library_index();

        repo.upsert(&entry("/data/movies/a.mkv", "a.mkv", 1))
            .await
            .unwrap();
        assert_eq!(repo.delete_path("/data/movies/a.mkv").await.unwrap(), 1);
        assert_eq!(repo.delete_path("/data/movies/a.mkv").await.unwrap(), 0);
        assert_eq!(repo.delete_path("/data/movies/never-indexed.mkv").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rename_path_moves_metadata_too() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir).await;

        db.library_index()
            .upsert(&entry("/data/movies/old.mkv", "old.mkv", 1))
            .await
            .unwrap();
        db.file_metadata()
            .upsert(&UpsertFileMetadata {
                path: "/data/movies/old.mkv".to_string(),
                title: Some("Old".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        db.library_index()
            .rename_path("/data/movies/old.mkv", "/data/movies/new.mkv", "new.mkv", "")
            .await
            .unwrap();

        assert!(
            db.library_index()
                .get("/data/movies/old.mkv")
                .await
                .unwrap()
                .is_none()
        );
        let moved = db
            .library_index()
            .get("/data/movies/new.mkv")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(moved.name, "new.mkv");
        assert!(
            db.file_metadata()
                .get("/data/movies/new.mkv")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_index_state_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let db = test_db(&dir).await;

        assert!(db.index_state().get(Category::Books).await.unwrap().is_none());
        db.index_state().write(Category::Books, 42).await.unwrap();
        let state = db.index_state().get(Category::Books).await.unwrap().unwrap();
        assert_eq!(state.item_count, 42);
    }
}
