//! Library index repository
//!
//! One row per indexed file, keyed by logical path. Full rebuilds clear the
//! category first; the organizer and upload paths update rows incrementally.

use anyhow::Result;
use sqlx::SqlitePool;

use super::sqlite_helpers::now_iso8601;
use crate::media::Category;

/// Number of rows written per transaction during full scans
pub const UPSERT_BATCH_SIZE: usize = 500;

/// Library index record from database
#[derive(Debug, Clone, PartialEq, serde::Serialize, sqlx::FromRow)]
pub struct IndexEntryRecord {
    pub path: String,
    pub category: String,
    pub name: String,
    pub folder: String,
    pub source: String,
    pub poster: Option<String>,
    pub mtime: Option<f64>,
    pub size: Option<i64>,
    pub genre: Option<String>,
    pub year: Option<String>,
    pub indexed_at: String,
}

/// Input for creating or refreshing an index entry
#[derive(Debug, Clone)]
pub struct CreateIndexEntry {
    pub path: String,
    pub category: Category,
    pub name: String,
    pub folder: String,
    pub source: String,
    pub poster: Option<String>,
    pub mtime: Option<f64>,
    pub size: Option<i64>,
    pub genre: Option<String>,
    pub year: Option<String>,
}

/// Sort order accepted by the query layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Name,
    Newest,
    Oldest,
    YearAsc,
    YearDesc,
    RecentlyPlayed,
    TopWatched,
}

impl SortKey {
    pub fn parse(s: &str) -> SortKey {
        match s {
            "newest" => SortKey::Newest,
            "oldest" => SortKey::Oldest,
            "year_asc" => SortKey::YearAsc,
            "year_desc" => SortKey::YearDesc,
            "recently_played" => SortKey::RecentlyPlayed,
            "top_watched" => SortKey::TopWatched,
            _ => SortKey::Name,
        }
    }

    /// ORDER BY clause for this key. Playback-derived sorts need a journal
    /// owned by an external collaborator; without one they degrade to
    /// natural name order.
    fn order_clause(&self) -> &'static str {
        match self {
            SortKey::Name | SortKey::RecentlyPlayed | SortKey::TopWatched => {
                "name COLLATE natural_sort ASC, path ASC"
            }
            SortKey::Newest => "mtime DESC, name COLLATE natural_sort ASC",
            SortKey::Oldest => "mtime ASC, name COLLATE natural_sort ASC",
            SortKey::YearAsc => "CAST(year AS INTEGER) ASC, name COLLATE natural_sort ASC",
            SortKey::YearDesc => "CAST(year AS INTEGER) DESC, name COLLATE natural_sort ASC",
        }
    }
}

/// Filter/pagination parameters for a library query
#[derive(Debug, Clone, Default)]
pub struct LibraryQuery {
    pub text: Option<String>,
    pub genre: Option<String>,
    pub year: Option<String>,
    pub sort: SortKey,
    pub offset: i64,
    pub limit: i64,
}

/// Files sharing a (name, size) pair
#[derive(Debug, Clone)]
pub struct DuplicateFileGroup {
    pub name: String,
    pub size: i64,
    pub paths: Vec<String>,
}

impl DuplicateFileGroup {
    /// Duplicate-resolution policy: keep the shortest path, ties broken
    /// lexicographically; everything else is marked for deletion.
    pub fn resolve(&self) -> (String, Vec<String>) {
        let mut paths = self.paths.clone();
        paths.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        let keep = paths.remove(0);
        (keep, paths)
    }
}

pub struct LibraryIndexRepository {
    pool: SqlitePool,
}

impl LibraryIndexRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace a single entry keyed by logical path
    pub async fn upsert(&self, entry: &CreateIndexEntry) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::upsert_in(&mut tx, entry).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn upsert_in(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        entry: &CreateIndexEntry,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO library_index
                (path, category, name, folder, source, poster, mtime, size, genre, year, indexed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(path) DO UPDATE SET
                category = excluded.category,
                name = excluded.name,
                folder = excluded.folder,
                source = excluded.source,
                poster = excluded.poster,
                mtime = excluded.mtime,
                size = excluded.size,
                genre = excluded.genre,
                year = excluded.year,
                indexed_at = excluded.indexed_at
            "#,
        )
        .bind(&entry.path)
        .bind(entry.category.as_str())
        .bind(&entry.name)
        .bind(&entry.folder)
        .bind(&entry.source)
        .bind(&entry.poster)
        .bind(entry.mtime)
        .bind(entry.size)
        .bind(&entry.genre)
        .bind(&entry.year)
        .bind(now_iso8601())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Upsert many entries, one transaction per batch of 500
    pub async fn upsert_batch(&self, entries: &[CreateIndexEntry]) -> Result<()> {
        for chunk in entries.chunks(UPSERT_BATCH_SIZE) {
            let mut tx = self.pool.begin().await?;
            for entry in chunk {
                Self::upsert_in(&mut tx, entry).await?;
            }
            tx.commit().await?;
        }
        Ok(())
    }

    /// Delete all entries and the build state row for a category; run before
    /// a forced full rebuild
    pub async fn clear_category(&self, category: Category) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM library_index WHERE category = ?")
            .bind(category.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM library_index_state WHERE category = ?")
            .bind(category.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Get a single entry by logical path
    pub async fn get(&self, path: &str) -> Result<Option<IndexEntryRecord>> {
        let record = sqlx::query_as::<_, IndexEntryRecord>(
            r#"
            SELECT path, category, name, folder, source, poster, mtime, size, genre, year, indexed_at
            FROM library_index WHERE path = ?
            "#,
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Paginated, filtered query. Returns the page plus the total row count
    /// for the same filters.
    pub async fn query(
        &self,
        category: Category,
        params: &LibraryQuery,
    ) -> Result<(Vec<IndexEntryRecord>, i64)> {
        let mut conditions = vec!["category = ?".to_string()];
        let mut binds: Vec<String> = vec![category.as_str().to_string()];

        if let Some(text) = params.text.as_deref().filter(|t| !t.is_empty()) {
            conditions.push("(name LIKE ? OR folder LIKE ?)".to_string());
            let pattern = format!("%{}%", text);
            binds.push(pattern.clone());
            binds.push(pattern);
        }
        if let Some(genre) = params.genre.as_deref().filter(|g| !g.is_empty()) {
            conditions.push("genre LIKE ?".to_string());
            binds.push(format!("%{}%", genre));
        }
        if let Some(year) = params.year.as_deref().filter(|y| !y.is_empty()) {
            conditions.push("year = ?".to_string());
            binds.push(year.to_string());
        }

        let where_clause = conditions.join(" AND ");

        let count_sql = format!(
            "SELECT COUNT(*) FROM library_index WHERE {}",
            where_clause
        );
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for bind in &binds {
            count_query = count_query.bind(bind);
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let select_sql = format!(
            r#"
            SELECT path, category, name, folder, source, poster, mtime, size, genre, year, indexed_at
            FROM library_index
            WHERE {}
            ORDER BY {}
            LIMIT ? OFFSET ?
            "#,
            where_clause,
            params.sort.order_clause()
        );
        let mut select_query = sqlx::query_as::<_, IndexEntryRecord>(&select_sql);
        for bind in &binds {
            select_query = select_query.bind(bind);
        }
        let records = select_query
            .bind(params.limit.max(0))
            .bind(params.offset.max(0))
            .fetch_all(&self.pool)
            .await?;

        Ok((records, total))
    }

    /// Group files by (name, size) and return groups with more than one
    /// member. Gallery and loose files are excluded: small images and
    /// generic names collide too often to mean anything.
    pub async fn find_duplicate_files(&self) -> Result<Vec<DuplicateFileGroup>> {
        let rows = sqlx::query_as::<_, (String, i64, String)>(
            r#"
            SELECT name, size, path FROM library_index
            WHERE size IS NOT NULL AND size > 0
              AND category IN ('movies', 'shows', 'music', 'books')
            ORDER BY name, size, path
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut groups: Vec<DuplicateFileGroup> = Vec::new();
        for (name, size, path) in rows {
            match groups.last_mut() {
                Some(group) if group.name == name && group.size == size => {
                    group.paths.push(path);
                }
                _ => groups.push(DuplicateFileGroup {
                    name,
                    size,
                    paths: vec![path],
                }),
            }
        }
        groups.retain(|g| g.paths.len() > 1);
        Ok(groups)
    }

    /// Point an entry at a new logical path after a move, keeping the
    /// metadata cache row attached to the file
    pub async fn rename_path(
        &self,
        old_path: &str,
        new_path: &str,
        new_name: &str,
        new_folder: &str,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE library_index SET path = ?, name = ?, folder = ?, indexed_at = ? WHERE path = ?",
        )
        .bind(new_path)
        .bind(new_name)
        .bind(new_folder)
        .bind(now_iso8601())
        .bind(old_path)
        .execute(&mut *tx)
        .await?;
        sqlx::query("UPDATE file_metadata SET path = ? WHERE path = ?")
            .bind(new_path)
            .bind(old_path)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Remove a single entry and its cached metadata. Returns the number
    /// of index rows removed (0 when the path was not indexed).
    pub async fn delete_path(&self, path: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM library_index WHERE path = ?")
            .bind(path)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM file_metadata WHERE path = ?")
            .bind(path)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }

    /// Remove every entry under a logical directory prefix
    pub async fn delete_subtree(&self, prefix: &str) -> Result<u64> {
        let like = format!("{}/%", prefix.trim_end_matches('/'));
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM library_index WHERE path = ? OR path LIKE ?")
            .bind(prefix)
            .bind(&like)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM file_metadata WHERE path = ? OR path LIKE ?")
            .bind(prefix)
            .bind(&like)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }

    /// Distinct genres for a category. Stored values are comma-separated
    /// provider strings; they are split and deduplicated here.
    pub async fn list_genres(&self, category: Category) -> Result<Vec<String>> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT genre FROM library_index WHERE category = ? AND genre IS NOT NULL AND genre != ''",
        )
        .bind(category.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut genres: Vec<String> = rows
            .iter()
            .flat_map(|g| g.split(','))
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .collect();
        genres.sort();
        genres.dedup();
        Ok(genres)
    }

    /// Distinct years for a category, newest first
    pub async fn list_years(&self, category: Category) -> Result<Vec<String>> {
        let years = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT year FROM library_index
            WHERE category = ? AND year IS NOT NULL AND year != ''
            ORDER BY CAST(year AS INTEGER) DESC
            "#,
        )
        .bind(category.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(years)
    }

    /// Row count for a category
    pub async fn count_category(&self, category: Category) -> Result<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM library_index WHERE category = ?")
                .bind(category.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
