//! REST endpoints
//!
//! A small JSON surface over the index store and the background services.
//! Handlers stay thin: parse the request, call a repository or service,
//! shape the response.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::AppState;
use crate::db::file_metadata::DuplicateMetadataGroup;
use crate::db::{FileMetadataRecord, IndexEntryRecord, LibraryQuery, SortKey};
use crate::media::Category;
use crate::services::organizer::{OrganizeOptions, OrganizeOutcome};
use crate::services::scheduler::BuildStatus;

type ApiError = (StatusCode, Json<serde_json::Value>);

fn internal_error(e: anyhow::Error) -> ApiError {
    error!(error = %e, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": e.to_string() })),
    )
}

fn bad_category(raw: &str) -> ApiError {
    let valid: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({
            "error": format!("unknown category: {raw}"),
            "valid": valid,
        })),
    )
}

fn parse_category(raw: &str) -> Result<Category, ApiError> {
    Category::parse(raw).ok_or_else(|| bad_category(raw))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: bool,
}

/// Liveness plus a database ping
async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_ok = sqlx::query("SELECT 1")
        .fetch_one(state.db.pool())
        .await
        .is_ok();
    Json(HealthResponse {
        status: if db_ok { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database: db_ok,
    })
}

// ---------------------------------------------------------------------------
// Library listing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub category: String,
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct ListResponse {
    pub items: Vec<IndexEntryRecord>,
    pub total: i64,
    /// Bumped on every rebuild; clients drop cached pages when it changes
    pub generation: u64,
    /// True while a rebuild of this category is in flight
    pub building: bool,
}

async fn list_library(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>, ApiError> {
    let category = parse_category(&params.category)?;
    let query = LibraryQuery {
        text: params.q,
        genre: params.genre,
        year: params.year,
        sort: params
            .sort
            .as_deref()
            .map(SortKey::parse)
            .unwrap_or_default(),
        offset: params.offset.unwrap_or(0).max(0),
        limit: params.limit.unwrap_or(100).clamp(1, 1000),
    };
    let (items, total) = state
        .db
        .library_index()
        .query(category, &query)
        .await
        .map_err(internal_error)?;
    Ok(Json(ListResponse {
        items,
        total,
        generation: state.registry.generation(),
        building: state.registry.is_building(category),
    }))
}

#[derive(Debug, Deserialize)]
pub struct FilterParams {
    pub category: String,
}

#[derive(Serialize)]
pub struct FilterResponse {
    pub genres: Vec<String>,
    pub years: Vec<String>,
    /// Indexed items in the category, before any filtering
    pub total: i64,
}

async fn list_filters(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Result<Json<FilterResponse>, ApiError> {
    let category = parse_category(&params.category)?;
    let repo = state.db.library_index();
    let genres = repo.list_genres(category).await.map_err(internal_error)?;
    let years = repo.list_years(category).await.map_err(internal_error)?;
    let total = repo.count_category(category).await.map_err(internal_error)?;
    Ok(Json(FilterResponse {
        genres,
        years,
        total,
    }))
}

// ---------------------------------------------------------------------------
// Item detail
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ItemParams {
    pub path: String,
}

#[derive(Serialize)]
pub struct ItemResponse {
    pub entry: IndexEntryRecord,
    pub metadata: Option<FileMetadataRecord>,
    /// Full provider payload parsed out of the cached row
    pub details: Option<serde_json::Value>,
}

async fn get_item(
    State(state): State<AppState>,
    Query(params): Query<ItemParams>,
) -> Result<Json<ItemResponse>, ApiError> {
    let entry = state
        .db
        .library_index()
        .get(&params.path)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": "path not indexed" })),
            )
        })?;
    let metadata = state
        .db
        .file_metadata()
        .get(&params.path)
        .await
        .map_err(internal_error)?;
    let details = metadata.as_ref().and_then(|m| m.metadata_value());
    Ok(Json(ItemResponse {
        entry,
        metadata,
        details,
    }))
}

// ---------------------------------------------------------------------------
// Rebuild
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RebuildRequest {
    pub category: String,
    #[serde(default)]
    pub force: bool,
}

#[derive(Serialize)]
pub struct RebuildResponse {
    pub status: BuildStatus,
}

async fn rebuild_library(
    State(state): State<AppState>,
    Json(body): Json<RebuildRequest>,
) -> Result<Json<RebuildResponse>, ApiError> {
    let category = parse_category(&body.category)?;
    let status = state
        .scheduler
        .maybe_start_build(category, body.force)
        .await
        .map_err(internal_error)?;
    Ok(Json(RebuildResponse { status }))
}

// ---------------------------------------------------------------------------
// Reorganize
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ReorganizeRequest {
    pub category: String,
    #[serde(default = "default_true")]
    pub dry_run: bool,
    #[serde(default = "default_true")]
    pub rename_files: bool,
    #[serde(default = "default_true")]
    pub use_metadata: bool,
    #[serde(default = "default_true")]
    pub write_poster: bool,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_true() -> bool {
    true
}

fn default_limit() -> usize {
    500
}

async fn reorganize_library(
    State(state): State<AppState>,
    Json(body): Json<ReorganizeRequest>,
) -> Result<Json<OrganizeOutcome>, ApiError> {
    let category = parse_category(&body.category)?;
    let options = OrganizeOptions {
        dry_run: body.dry_run,
        rename_files: body.rename_files,
        use_metadata: body.use_metadata,
        write_poster: body.write_poster,
        limit: body.limit,
    };
    let outcome = state
        .organizer
        .organize(category, &options)
        .await
        .map_err(internal_error)?;
    if !body.dry_run {
        state.registry.bump_generation();
    }
    Ok(Json(outcome))
}

// ---------------------------------------------------------------------------
// Duplicates
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct DuplicateGroupResponse {
    pub name: String,
    pub size: i64,
    pub keep: String,
    pub remove: Vec<String>,
}

#[derive(Serialize)]
pub struct DuplicatesResponse {
    /// Same name and byte size, with the keep-shortest policy applied
    pub files: Vec<DuplicateGroupResponse>,
    /// Distinct files whose cached metadata shares an external id
    pub metadata: Vec<DuplicateMetadataGroup>,
}

async fn list_duplicates(
    State(state): State<AppState>,
) -> Result<Json<DuplicatesResponse>, ApiError> {
    let groups = state
        .db
        .library_index()
        .find_duplicate_files()
        .await
        .map_err(internal_error)?;
    let files = groups
        .into_iter()
        .map(|g| {
            let (keep, remove) = g.resolve();
            DuplicateGroupResponse {
                name: g.name,
                size: g.size,
                keep,
                remove,
            }
        })
        .collect();
    let metadata = state
        .db
        .file_metadata()
        .find_duplicate_external_ids()
        .await
        .map_err(internal_error)?;
    Ok(Json(DuplicatesResponse { files, metadata }))
}

#[derive(Debug, Deserialize)]
pub struct FixDuplicatesRequest {
    #[serde(default = "default_true")]
    pub dry_run: bool,
}

#[derive(Serialize)]
pub struct FixDuplicatesResponse {
    pub dry_run: bool,
    pub groups: usize,
    pub removed: u64,
    pub errors: u64,
}

/// Applies the keep-shortest policy. Dry runs report what would happen
/// without touching disk or index.
async fn fix_duplicates(
    State(state): State<AppState>,
    Json(body): Json<FixDuplicatesRequest>,
) -> Result<Json<FixDuplicatesResponse>, ApiError> {
    let groups = state
        .db
        .library_index()
        .find_duplicate_files()
        .await
        .map_err(internal_error)?;

    let mut removed = 0u64;
    let mut errors = 0u64;
    for group in &groups {
        let (_keep, remove) = group.resolve();
        for logical in remove {
            if body.dry_run {
                removed += 1;
                continue;
            }
            let fs_path = match state.resolver.to_fs_path(&logical) {
                Ok(p) => p,
                Err(e) => {
                    warn!(path = %logical, error = %e, "skipping unresolvable duplicate");
                    errors += 1;
                    continue;
                }
            };
            if let Err(e) = tokio::fs::remove_file(&fs_path).await {
                warn!(path = %logical, error = %e, "failed to delete duplicate file");
                errors += 1;
                continue;
            }
            if let Err(e) = state.db.library_index().delete_path(&logical).await {
                warn!(path = %logical, error = %e, "deleted file but failed to drop index row");
                errors += 1;
                continue;
            }
            removed += 1;
        }
    }
    if !body.dry_run && removed > 0 {
        state.registry.bump_generation();
    }
    Ok(Json(FixDuplicatesResponse {
        dry_run: body.dry_run,
        groups: groups.len(),
        removed,
        errors,
    }))
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub path: String,
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    /// Index rows dropped
    pub removed: u64,
}

/// Removes a file, or with `recursive` a whole folder, from disk and from
/// the index. A path already missing on disk still has its rows dropped.
async fn delete_item(
    State(state): State<AppState>,
    Json(body): Json<DeleteRequest>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let fs_path = state.resolver.to_fs_path(&body.path).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
    })?;

    let fs_result = if body.recursive {
        tokio::fs::remove_dir_all(&fs_path).await
    } else {
        tokio::fs::remove_file(&fs_path).await
    };
    match fs_result {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %body.path, "delete target already gone, dropping index rows")
        }
        Err(e) => return Err(internal_error(e.into())),
    }

    let removed = if body.recursive {
        state
            .db
            .library_index()
            .delete_subtree(&body.path)
            .await
            .map_err(internal_error)?
    } else {
        state
            .db
            .library_index()
            .delete_path(&body.path)
            .await
            .map_err(internal_error)?
    };
    state.registry.bump_generation();
    Ok(Json(DeleteResponse { removed }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/library", get(list_library))
        .route("/api/library/item", get(get_item))
        .route("/api/library/filters", get(list_filters))
        .route("/api/library/rebuild", post(rebuild_library))
        .route("/api/library/reorganize", post(reorganize_library))
        .route("/api/library/duplicates", get(list_duplicates))
        .route("/api/library/duplicates/fix", post(fix_duplicates))
        .route("/api/library/delete", post(delete_item))
}
