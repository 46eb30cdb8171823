//! Cached provider metadata, keyed by logical path
//!
//! Rows are written only after a successful provider match and are reused by
//! the scanner and organizer so a file is looked up at most once per
//! staleness window.

use anyhow::Result;
use chrono::{Duration, Utc};
use sqlx::SqlitePool;

use super::sqlite_helpers::{from_json_opt, now_iso8601, str_to_datetime};

/// Metadata entries older than this are re-fetched on demand
pub const METADATA_MAX_AGE_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, serde::Serialize, sqlx::FromRow)]
pub struct FileMetadataRecord {
    pub path: String,
    pub media_type: Option<String>,
    pub title: Option<String>,
    pub year: Option<String>,
    pub imdb_id: Option<String>,
    pub poster: Option<String>,
    pub plot: Option<String>,
    pub rated: Option<String>,
    pub runtime: Option<String>,
    pub genre: Option<String>,
    pub meta_json: Option<String>,
    pub fetched_at: String,
}

impl FileMetadataRecord {
    /// Whether the row is past the re-fetch window
    pub fn is_stale(&self) -> bool {
        match str_to_datetime(&self.fetched_at) {
            Ok(fetched) => Utc::now() - fetched > Duration::days(METADATA_MAX_AGE_DAYS),
            Err(_) => true,
        }
    }

    /// Full provider payload, when one was stored with the row
    pub fn metadata_value(&self) -> Option<serde_json::Value> {
        from_json_opt(self.meta_json.as_deref()).ok().flatten()
    }
}

/// Input for writing a metadata cache row
#[derive(Debug, Clone, Default)]
pub struct UpsertFileMetadata {
    pub path: String,
    pub media_type: Option<String>,
    pub title: Option<String>,
    pub year: Option<String>,
    pub imdb_id: Option<String>,
    pub poster: Option<String>,
    pub plot: Option<String>,
    pub rated: Option<String>,
    pub runtime: Option<String>,
    pub genre: Option<String>,
    pub meta_json: Option<String>,
}

/// Metadata rows sharing an external id
#[derive(Debug, Clone, serde::Serialize)]
pub struct DuplicateMetadataGroup {
    pub imdb_id: String,
    pub paths: Vec<String>,
}

pub struct FileMetadataRepository {
    pool: SqlitePool,
}

impl FileMetadataRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, input: &UpsertFileMetadata) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO file_metadata
                (path, media_type, title, year, imdb_id, poster, plot, rated, runtime, genre, meta_json, fetched_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(path) DO UPDATE SET
                media_type = excluded.media_type,
                title = excluded.title,
                year = excluded.year,
                imdb_id = excluded.imdb_id,
                poster = excluded.poster,
                plot = excluded.plot,
                rated = excluded.rated,
                runtime = excluded.runtime,
                genre = excluded.genre,
                meta_json = excluded.meta_json,
                fetched_at = excluded.fetched_at
            "#,
        )
        .bind(&input.path)
        .bind(&input.media_type)
        .bind(&input.title)
        .bind(&input.year)
        .bind(&input.imdb_id)
        .bind(&input.poster)
        .bind(&input.plot)
        .bind(&input.rated)
        .bind(&input.runtime)
        .bind(&input.genre)
        .bind(&input.meta_json)
        .bind(now_iso8601())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, path: &str) -> Result<Option<FileMetadataRecord>> {
        let record = sqlx::query_as::<_, FileMetadataRecord>(
            r#"
            SELECT path, media_type, title, year, imdb_id, poster, plot, rated, runtime, genre, meta_json, fetched_at
            FROM file_metadata WHERE path = ?
            "#,
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Get a row only if it is inside the staleness window
    pub async fn get_fresh(&self, path: &str) -> Result<Option<FileMetadataRecord>> {
        Ok(self.get(path).await?.filter(|r| !r.is_stale()))
    }

    /// Group rows by non-empty external id; groups with more than one path
    /// are the same title cached for multiple files
    pub async fn find_duplicate_external_ids(&self) -> Result<Vec<DuplicateMetadataGroup>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT imdb_id, path FROM file_metadata
            WHERE imdb_id IS NOT NULL AND imdb_id != ''
            ORDER BY imdb_id, path
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut groups: Vec<DuplicateMetadataGroup> = Vec::new();
        for (imdb_id, path) in rows {
            match groups.last_mut() {
                Some(group) if group.imdb_id == imdb_id => group.paths.push(path),
                _ => groups.push(DuplicateMetadataGroup {
                    imdb_id,
                    paths: vec![path],
                }),
            }
        }
        groups.retain(|g| g.paths.len() > 1);
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite_helpers::datetime_to_str;

    fn record_fetched_at(fetched_at: String) -> FileMetadataRecord {
        FileMetadataRecord {
            path: "/data/movies/alien.mkv".to_string(),
            media_type: Some("movie".to_string()),
            title: Some("Alien".to_string()),
            year: Some("1979".to_string()),
            imdb_id: Some("tt0078748".to_string()),
            poster: None,
            plot: None,
            rated: None,
            runtime: None,
            genre: None,
            meta_json: None,
            fetched_at,
        }
    }

    #[test]
    fn test_fresh_record_is_not_stale() {
        let record = record_fetched_at(now_iso8601());
        assert!(!record.is_stale());
    }

    #[test]
    fn test_old_record_is_stale() {
        let old = Utc::now() - Duration::days(METADATA_MAX_AGE_DAYS + 1);
        let record = record_fetched_at(datetime_to_str(old));
        assert!(record.is_stale());
    }

    #[test]
    fn test_unparseable_timestamp_is_stale() {
        let record = record_fetched_at("not-a-date".to_string());
        assert!(record.is_stale());
    }
}
