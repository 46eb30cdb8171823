//! Per-category index build state
//!
//! One row per category, overwritten at the end of every build. The
//! scheduler reads it to decide whether a category is fresh.

use anyhow::Result;
use sqlx::SqlitePool;

use super::sqlite_helpers::now_iso8601;
use crate::media::Category;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct IndexStateRecord {
    pub category: String,
    pub scanned_at: String,
    pub item_count: i64,
}

pub struct IndexStateRepository {
    pool: SqlitePool,
}

impl IndexStateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, category: Category) -> Result<Option<IndexStateRecord>> {
        let record = sqlx::query_as::<_, IndexStateRecord>(
            "SELECT category, scanned_at, item_count FROM library_index_state WHERE category = ?",
        )
        .bind(category.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Record a completed build for the category
    pub async fn write(&self, category: Category, item_count: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO library_index_state (category, scanned_at, item_count)
            VALUES (?, ?, ?)
            ON CONFLICT(category) DO UPDATE SET
                scanned_at = excluded.scanned_at,
                item_count = excluded.item_count
            "#,
        )
        .bind(category.as_str())
        .bind(now_iso8601())
        .bind(item_count)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
