//! Reorganizes library files into the canonical folder layout
//!
//! A run is a three-phase state machine: PLANNING walks the category roots
//! and builds a move plan without touching anything; EXECUTING performs the
//! moves, enriches metadata, and writes poster files; CLEANUP removes
//! directories left empty or holding only sidecar junk. A dry run stops
//! after planning.
//!
//! Destinations: movies become `Title (Year)/Title (Year).ext`, shows become
//! `Show/Season N/SxxEyy.ext` (or keep the original filename). Individual
//! move failures are counted and logged; the run always continues.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::db::sqlite_helpers::to_json;
use crate::db::{CreateIndexEntry, Database, UpsertFileMetadata};
use crate::media::{self, Category};
use crate::services::filename_parser::{
    guess_title_year, infer_show_name, parse_episode_only, parse_season_episode, sanitize_part,
};
use crate::services::matcher::MetadataMatcher;
use crate::services::omdb::OmdbItem;
use crate::services::paths::{PathResolver, move_file};
use crate::services::posters::PosterCache;

/// Hard cap on per-run item limits
pub const MAX_ORGANIZE_LIMIT: usize = 5000;
/// At most this many plan items are returned to the caller
pub const MAX_PLAN_SAMPLE: usize = 1000;

/// Caller-facing knobs for one run
#[derive(Debug, Clone)]
pub struct OrganizeOptions {
    pub dry_run: bool,
    pub rename_files: bool,
    pub use_metadata: bool,
    pub write_poster: bool,
    pub limit: usize,
}

impl Default for OrganizeOptions {
    fn default() -> Self {
        Self {
            dry_run: true,
            rename_files: true,
            use_metadata: true,
            write_poster: true,
            limit: 500,
        }
    }
}

/// A planned move, in logical paths
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PlanItem {
    pub from: String,
    pub to: String,
}

/// Partial-success summary of a run
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct OrganizeOutcome {
    pub moved: u64,
    pub skipped: u64,
    pub errors: u64,
    pub planned: Vec<PlanItem>,
}

impl OrganizeOutcome {
    fn push_plan(&mut self, from: String, to: String) {
        if self.planned.len() < MAX_PLAN_SAMPLE {
            self.planned.push(PlanItem { from, to });
        }
    }
}

pub struct OrganizerService {
    db: Database,
    resolver: Arc<PathResolver>,
    matcher: Option<Arc<MetadataMatcher>>,
    posters: Arc<PosterCache>,
}

impl OrganizerService {
    pub fn new(
        db: Database,
        resolver: Arc<PathResolver>,
        matcher: Option<Arc<MetadataMatcher>>,
        posters: Arc<PosterCache>,
    ) -> Self {
        Self {
            db,
            resolver,
            matcher,
            posters,
        }
    }

    /// Organize a category. Only movies and shows have canonical layouts;
    /// other categories are left alone.
    pub async fn organize(
        &self,
        category: Category,
        options: &OrganizeOptions,
    ) -> Result<OrganizeOutcome> {
        match category {
            Category::Movies => self.organize_movies(options).await,
            Category::Shows => self.organize_shows(options).await,
            _ => Ok(OrganizeOutcome::default()),
        }
    }

    pub async fn organize_movies(&self, options: &OrganizeOptions) -> Result<OrganizeOutcome> {
        let limit = options.limit.clamp(1, MAX_ORGANIZE_LIMIT);
        let roots = self.resolver.scan_roots(Category::Movies);
        let dest_root = self.resolver.data_root().join("movies");
        tokio::fs::create_dir_all(&dest_root)
            .await
            .context("failed to create movies root")?;

        let candidates = collect_video_files(&roots).await?;
        info!(
            candidates = candidates.len(),
            dry_run = options.dry_run,
            "movie organize run started"
        );

        let mut outcome = OrganizeOutcome::default();
        // One provider lookup per derived title per run
        let mut memo: HashMap<String, Option<OmdbItem>> = HashMap::new();
        let mut processed = 0usize;

        for source in candidates {
            if processed >= limit {
                break;
            }
            let file_name = match source.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };

            let (guessed_title, guessed_year) = guess_title_year(&file_name);
            if guessed_title.len() < 2 {
                outcome.skipped += 1;
                continue;
            }

            let source_logical = self.resolver.to_logical_path(&source);
            let cached = if options.use_metadata {
                self.cached_metadata(source_logical.as_deref(), "movie").await
            } else {
                None
            };
            let from_cache = cached.is_some();
            let metadata = match cached {
                Some(item) => Some(item),
                None if options.use_metadata => {
                    self.lookup(&mut memo, &guessed_title, guessed_year.as_deref(), "movie")
                        .await
                }
                None => None,
            };

            let title = metadata
                .as_ref()
                .and_then(|m| m.title.clone())
                .unwrap_or_else(|| guessed_title.clone());
            // year_number drops "N/A" and range forms like "2008–2013"
            let year = metadata
                .as_ref()
                .and_then(|m| m.year_number())
                .map(|y| y.to_string())
                .or(guessed_year);

            let folder_name = sanitize_part(&match &year {
                Some(year) => format!("{} ({})", title, year),
                None => title.clone(),
            });
            if folder_name.is_empty() {
                outcome.skipped += 1;
                continue;
            }

            let extension = media::extension_of(&source).unwrap_or_default();
            let dest_name = if options.rename_files {
                format!("{}{}", folder_name, extension)
            } else {
                file_name.clone()
            };
            let dest_dir = dest_root.join(&folder_name);
            let dest = dest_dir.join(&dest_name);

            if dest == source {
                continue; // already canonical
            }

            // Duplicate avoidance: an existing same-named folder that already
            // holds a playable file wins, unless it is the file's own folder
            if let Some(existing) = find_existing_movie_folder(&dest_root, &folder_name) {
                let own_dir = source.parent().map(|p| p == existing).unwrap_or(false);
                if !own_dir && folder_has_playable(&existing) {
                    debug!(file = %file_name, folder = %existing.display(), "duplicate, skipped");
                    outcome.skipped += 1;
                    continue;
                }
            }

            let (Some(from_logical), Some(to_logical)) =
                (source_logical, self.resolver.to_logical_path(&dest))
            else {
                outcome.errors += 1;
                continue;
            };

            outcome.push_plan(from_logical.clone(), to_logical.clone());
            processed += 1;
            if options.dry_run {
                continue;
            }

            match self
                .execute_move(
                    &source,
                    &dest_dir,
                    &dest,
                    &from_logical,
                    Category::Movies,
                    &folder_name,
                )
                .await
            {
                Ok(final_logical) => {
                    outcome.moved += 1;
                    if let Some(metadata) = metadata.as_ref() {
                        if !from_cache {
                            self.persist_metadata(&final_logical, "movie", metadata).await;
                        }
                        if options.write_poster {
                            self.write_folder_poster(&dest_dir, metadata).await;
                        }
                    }
                }
                Err(e) => {
                    warn!(file = %file_name, error = %e, "move failed, continuing");
                    outcome.errors += 1;
                }
            }
        }

        if !options.dry_run {
            cleanup_roots(&roots).await;
        }
        info!(
            moved = outcome.moved,
            skipped = outcome.skipped,
            errors = outcome.errors,
            "movie organize run finished"
        );
        Ok(outcome)
    }

    pub async fn organize_shows(&self, options: &OrganizeOptions) -> Result<OrganizeOutcome> {
        let limit = options.limit.clamp(1, MAX_ORGANIZE_LIMIT);
        let roots = self.resolver.scan_roots(Category::Shows);
        let dest_root = self.resolver.data_root().join("shows");
        tokio::fs::create_dir_all(&dest_root)
            .await
            .context("failed to create shows root")?;

        let candidates = collect_video_files(&roots).await?;
        info!(
            candidates = candidates.len(),
            dry_run = options.dry_run,
            "show organize run started"
        );

        let mut outcome = OrganizeOutcome::default();
        let mut memo: HashMap<String, Option<OmdbItem>> = HashMap::new();
        let mut processed = 0usize;

        for source in candidates {
            if processed >= limit {
                break;
            }
            let file_name = match source.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };

            let relative = relative_to_any_root(&roots, &source);
            let Some(derived_show) = infer_show_name(&relative) else {
                outcome.skipped += 1;
                continue;
            };
            let (season, episode) = parse_season_episode(&file_name);
            // "Episode 12.mkv" inside "Season 2" still gets a canonical name
            let season = season.or_else(|| season_from_path(&relative));
            let episode = episode.or_else(|| parse_episode_only(&file_name));

            let source_logical = self.resolver.to_logical_path(&source);
            let cached = if options.use_metadata {
                self.cached_metadata(source_logical.as_deref(), "series").await
            } else {
                None
            };
            let from_cache = cached.is_some();
            let metadata = match cached {
                Some(item) => Some(item),
                None if options.use_metadata => {
                    self.lookup(&mut memo, &derived_show, None, "series").await
                }
                None => None,
            };
            let show_name = sanitize_part(
                &metadata
                    .as_ref()
                    .and_then(|m| m.title.clone())
                    .unwrap_or_else(|| derived_show.clone()),
            );
            if show_name.len() < 2 {
                outcome.skipped += 1;
                continue;
            }

            let season_number = season.unwrap_or(1);
            let extension = media::extension_of(&source).unwrap_or_default();
            let dest_name = match (options.rename_files, episode) {
                (true, Some(episode)) => {
                    format!("S{:02}E{:02}{}", season_number, episode, extension)
                }
                _ => file_name.clone(),
            };
            let dest_dir = dest_root
                .join(&show_name)
                .join(format!("Season {}", season_number));
            let dest = dest_dir.join(&dest_name);

            if dest == source {
                continue;
            }

            let (Some(from_logical), Some(to_logical)) =
                (source_logical, self.resolver.to_logical_path(&dest))
            else {
                outcome.errors += 1;
                continue;
            };

            outcome.push_plan(from_logical.clone(), to_logical.clone());
            processed += 1;
            if options.dry_run {
                continue;
            }

            let folder = format!("{}/Season {}", show_name, season_number);
            match self
                .execute_move(
                    &source,
                    &dest_dir,
                    &dest,
                    &from_logical,
                    Category::Shows,
                    &folder,
                )
                .await
            {
                Ok(final_logical) => {
                    outcome.moved += 1;
                    if let Some(metadata) = metadata.as_ref() {
                        if !from_cache {
                            self.persist_metadata(&final_logical, "series", metadata).await;
                        }
                        if options.write_poster {
                            // Poster belongs to the show folder, not the season
                            if let Some(show_dir) = dest_dir.parent() {
                                self.write_folder_poster(show_dir, metadata).await;
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(file = %file_name, error = %e, "move failed, continuing");
                    outcome.errors += 1;
                }
            }
        }

        if !options.dry_run {
            cleanup_roots(&roots).await;
        }
        info!(
            moved = outcome.moved,
            skipped = outcome.skipped,
            errors = outcome.errors,
            "show organize run finished"
        );
        Ok(outcome)
    }

    async fn lookup(
        &self,
        memo: &mut HashMap<String, Option<OmdbItem>>,
        title: &str,
        year: Option<&str>,
        media_type: &str,
    ) -> Option<OmdbItem> {
        let matcher = self.matcher.as_ref()?;
        let key = format!(
            "{}|{}|{}",
            media_type,
            title.to_lowercase(),
            year.unwrap_or("")
        );
        if let Some(cached) = memo.get(&key) {
            return cached.clone();
        }
        let result = matcher.best_match(title, year, Some(media_type)).await;
        memo.insert(key, result.clone());
        result
    }

    /// Provider data already cached for this file and still inside the
    /// re-fetch window. Survived moves keep their row attached, so a
    /// re-organize of an already-enriched tree makes no provider calls.
    async fn cached_metadata(&self, logical: Option<&str>, media_type: &str) -> Option<OmdbItem> {
        let logical = logical?;
        let record = self
            .db
            .file_metadata()
            .get_fresh(logical)
            .await
            .ok()
            .flatten()?;
        if record.media_type.as_deref() != Some(media_type) {
            return None;
        }
        let raw = record.metadata_value().unwrap_or(serde_json::Value::Null);
        Some(OmdbItem {
            title: record.title,
            year: record.year,
            rated: record.rated,
            runtime: record.runtime,
            genre: record.genre,
            plot: record.plot,
            poster: record.poster,
            imdb_id: record.imdb_id,
            media_type: record.media_type,
            raw,
        })
    }

    /// Move one file and update the index. Returns the final logical path,
    /// which may carry a uniqueness suffix.
    async fn execute_move(
        &self,
        source: &Path,
        dest_dir: &Path,
        dest: &Path,
        from_logical: &str,
        category: Category,
        folder: &str,
    ) -> Result<String> {
        tokio::fs::create_dir_all(dest_dir)
            .await
            .context("failed to create destination folder")?;
        let final_dest = pick_unique_dest(dest)?;
        move_file(source, &final_dest)
            .await
            .with_context(|| format!("move to {} failed", final_dest.display()))?;

        let final_logical = self
            .resolver
            .to_logical_path(&final_dest)
            .unwrap_or_else(|| from_logical.to_string());
        let name = final_dest
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        // Keep the metadata cache row attached, then refresh attributes
        self.db
            .library_index()
            .rename_path(from_logical, &final_logical, &name, folder)
            .await?;
        let (size, mtime) = match tokio::fs::metadata(&final_dest).await {
            Ok(meta) => {
                let mtime = meta
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                    .map(|d| d.as_secs_f64());
                (Some(meta.len() as i64), mtime)
            }
            Err(_) => (None, None),
        };
        self.db
            .library_index()
            .upsert(&CreateIndexEntry {
                path: final_logical.clone(),
                category,
                name,
                folder: folder.to_string(),
                source: "local".to_string(),
                poster: None,
                mtime,
                size,
                genre: None,
                year: None,
            })
            .await?;
        Ok(final_logical)
    }

    async fn persist_metadata(&self, logical: &str, media_type: &str, item: &OmdbItem) {
        let input = UpsertFileMetadata {
            path: logical.to_string(),
            media_type: Some(media_type.to_string()),
            title: item.title.clone(),
            year: item.year.clone(),
            imdb_id: item.imdb_id.clone(),
            poster: item.poster_url().map(str::to_string),
            plot: item.plot.clone(),
            rated: item.rated.clone(),
            runtime: item.runtime.clone(),
            genre: item.genre.clone(),
            meta_json: Some(to_json(&item.raw)),
        };
        if let Err(e) = self.db.file_metadata().upsert(&input).await {
            warn!(path = %logical, error = %e, "metadata cache write failed");
        }
    }

    /// Copy the cached provider poster into the destination folder
    async fn write_folder_poster(&self, dest_dir: &Path, item: &OmdbItem) {
        let Some(url) = item.poster_url() else {
            return;
        };
        let target = dest_dir.join("poster.jpg");
        if target.exists() {
            return;
        }
        match self.posters.fetch(url).await {
            Ok(Some(cached)) => {
                if let Err(e) = tokio::fs::copy(&cached, &target).await {
                    warn!(error = %e, "poster copy failed");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "poster fetch failed"),
        }
    }
}

/// All playable video files under the given roots, collected off the async
/// runtime
async fn collect_video_files(roots: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let roots = roots.to_vec();
    tokio::task::spawn_blocking(move || {
        let mut files = Vec::new();
        for root in &roots {
            for entry in WalkDir::new(root)
                .follow_links(true)
                .into_iter()
                .filter_entry(|e| {
                    !e.path()
                        .file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| n.starts_with('.'))
                        .unwrap_or(false)
                })
                .flatten()
            {
                if entry.file_type().is_file() && media::is_playable_video(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        }
        files.sort();
        files
    })
    .await
    .context("collection task panicked")
}

/// Season number carried by a "Season N" directory in the relative path
fn season_from_path(relative: &str) -> Option<u32> {
    Path::new(relative)
        .iter()
        .filter_map(|c| c.to_str())
        .find_map(|dir| {
            let lower = dir.to_lowercase();
            if let Some(n) = lower
                .strip_prefix("season")
                .map(str::trim)
                .and_then(|n| n.parse().ok())
            {
                return Some(n);
            }
            // bare "S2" / "S02" season directories
            lower.strip_prefix('s').and_then(|n| n.parse().ok())
        })
}

fn relative_to_any_root(roots: &[PathBuf], path: &Path) -> String {
    for root in roots {
        if let Ok(rel) = path.strip_prefix(root) {
            return rel.to_string_lossy().to_string();
        }
    }
    path.to_string_lossy().to_string()
}

/// An existing destination folder whose sanitized name matches
/// case-insensitively
fn find_existing_movie_folder(dest_root: &Path, folder_name: &str) -> Option<PathBuf> {
    let wanted = sanitize_part(folder_name).to_lowercase();
    let entries = std::fs::read_dir(dest_root).ok()?;
    for entry in entries.flatten() {
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if sanitize_part(&name).to_lowercase() == wanted {
            return Some(entry.path());
        }
    }
    None
}

fn folder_has_playable(dir: &Path) -> bool {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return false;
    };
    entries
        .flatten()
        .any(|e| e.path().is_file() && media::is_playable_video(&e.path()))
}

/// First free destination path: the literal path, else "name (2)" through
/// "name (999)" inserted before the extension.
fn pick_unique_dest(dest: &Path) -> Result<PathBuf> {
    if !dest.exists() {
        return Ok(dest.to_path_buf());
    }
    let stem = dest
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = media::extension_of(dest).unwrap_or_default();
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    for n in 2..=999 {
        let candidate = parent.join(format!("{} ({}){}", stem, n, extension));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    anyhow::bail!("no free destination name for {}", dest.display())
}

/// Remove directories under the roots that are empty or hold only junk
/// sidecar files. Deepest directories go first.
async fn cleanup_roots(roots: &[PathBuf]) {
    let roots = roots.to_vec();
    let result = tokio::task::spawn_blocking(move || {
        for root in &roots {
            for entry in WalkDir::new(root)
                .min_depth(1)
                .contents_first(true)
                .into_iter()
                .flatten()
            {
                let path = entry.path();
                if !entry.file_type().is_dir() {
                    continue;
                }
                if let Err(e) = remove_if_junk_only(path) {
                    debug!(dir = %path.display(), error = %e, "cleanup skipped directory");
                }
            }
        }
    })
    .await;
    if let Err(e) = result {
        warn!(error = %e, "cleanup task panicked");
    }
}

fn remove_if_junk_only(dir: &Path) -> std::io::Result<()> {
    let mut junk = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if entry.path().is_file() && media::is_junk_file(&name) {
            junk.push(entry.path());
        } else {
            return Ok(()); // real content, keep the directory
        }
    }
    for file in junk {
        std::fs::remove_file(file)?;
    }
    std::fs::remove_dir(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pick_unique_dest_free_path() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("Alien (1979).mkv");
        assert_eq!(pick_unique_dest(&dest).unwrap(), dest);
    }

    #[test]
    fn test_pick_unique_dest_appends_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("Alien (1979).mkv");
        std::fs::write(&dest, b"v").unwrap();
        assert_eq!(
            pick_unique_dest(&dest).unwrap(),
            dir.path().join("Alien (1979) (2).mkv")
        );
        std::fs::write(dir.path().join("Alien (1979) (2).mkv"), b"v").unwrap();
        assert_eq!(
            pick_unique_dest(&dest).unwrap(),
            dir.path().join("Alien (1979) (3).mkv")
        );
    }

    #[test]
    fn test_find_existing_movie_folder_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("Alien (1979)")).unwrap();
        assert!(find_existing_movie_folder(dir.path(), "alien (1979)").is_some());
        assert!(find_existing_movie_folder(dir.path(), "Aliens (1986)").is_none());
    }

    #[test]
    fn test_folder_has_playable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!folder_has_playable(dir.path()));
        std::fs::write(dir.path().join("poster.jpg"), b"p").unwrap();
        assert!(!folder_has_playable(dir.path()));
        std::fs::write(dir.path().join("movie.mkv"), b"v").unwrap();
        assert!(folder_has_playable(dir.path()));
    }

    #[test]
    fn test_remove_if_junk_only() {
        let dir = tempfile::tempdir().unwrap();
        let junk_dir = dir.path().join("old");
        std::fs::create_dir(&junk_dir).unwrap();
        std::fs::write(junk_dir.join("poster.jpg"), b"p").unwrap();
        std::fs::write(junk_dir.join("movie.nfo"), b"n").unwrap();
        remove_if_junk_only(&junk_dir).unwrap();
        assert!(!junk_dir.exists());

        let keep_dir = dir.path().join("keep");
        std::fs::create_dir(&keep_dir).unwrap();
        std::fs::write(keep_dir.join("movie.mkv"), b"v").unwrap();
        remove_if_junk_only(&keep_dir).unwrap();
        assert!(keep_dir.exists());
    }

    #[test]
    fn test_season_from_path() {
        assert_eq!(season_from_path("Severance/Season 2/Episode 3.mkv"), Some(2));
        assert_eq!(season_from_path("Severance/season3/04.mkv"), Some(3));
        assert_eq!(season_from_path("Severance/S02/Episode 3.mkv"), Some(2));
        assert_eq!(season_from_path("Severance/s2/Episode 3.mkv"), Some(2));
        assert_eq!(season_from_path("Severance/Severance.S01E02.mkv"), None);
    }

    #[test]
    fn test_plan_sample_is_capped() {
        let mut outcome = OrganizeOutcome::default();
        for i in 0..(MAX_PLAN_SAMPLE + 10) {
            outcome.push_plan(format!("/data/a{}", i), format!("/data/b{}", i));
        }
        assert_eq!(outcome.planned.len(), MAX_PLAN_SAMPLE);
    }

    async fn test_service(dir: &tempfile::TempDir, data_root: &Path) -> OrganizerService {
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
        let db = Database::connect(&url).await.unwrap();
        db.migrate().await.unwrap();
        let resolver = Arc::new(PathResolver::new(data_root.to_path_buf(), false).unwrap());
        let posters = Arc::new(PosterCache::new(dir.path().join("posters")));
        OrganizerService::new(db, resolver, None, posters)
    }

    fn heuristics_only() -> OrganizeOptions {
        OrganizeOptions {
            use_metadata: false,
            write_poster: false,
            ..OrganizeOptions::default()
        }
    }

    #[tokio::test]
    async fn test_organize_movies_dry_run_then_execute() {
        let dir = tempfile::tempdir().unwrap();
        let data_root = dir.path().join("data");
        std::fs::create_dir_all(data_root.join("movies")).unwrap();
        std::fs::write(data_root.join("movies/Heat.1995.1080p.BluRay.mkv"), b"v").unwrap();
        let service = test_service(&dir, &data_root).await;

        let mut options = heuristics_only();
        let plan = service.organize_movies(&options).await.unwrap();
        assert_eq!(plan.moved, 0);
        assert_eq!(plan.planned.len(), 1);
        assert_eq!(plan.planned[0].to, "/data/movies/Heat (1995)/Heat (1995).mkv");
        // dry run leaves the tree alone
        assert!(data_root.join("movies/Heat.1995.1080p.BluRay.mkv").exists());

        options.dry_run = false;
        let run = service.organize_movies(&options).await.unwrap();
        assert_eq!(run.moved, 1);
        assert!(data_root.join("movies/Heat (1995)/Heat (1995).mkv").exists());
        assert!(!data_root.join("movies/Heat.1995.1080p.BluRay.mkv").exists());

        // the canonical tree is a fixed point
        let again = service.organize_movies(&options).await.unwrap();
        assert_eq!(again.moved, 0);
        assert!(again.planned.is_empty());
    }

    #[tokio::test]
    async fn test_organize_movies_skips_existing_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let data_root = dir.path().join("data");
        let movies = data_root.join("movies");
        std::fs::create_dir_all(movies.join("Alien (1979)")).unwrap();
        std::fs::write(movies.join("Alien (1979)/Alien (1979).mkv"), b"v").unwrap();
        std::fs::write(movies.join("alien.1979.mkv"), b"v2").unwrap();
        let service = test_service(&dir, &data_root).await;

        let options = OrganizeOptions {
            dry_run: false,
            ..heuristics_only()
        };
        let outcome = service.organize_movies(&options).await.unwrap();
        assert_eq!(outcome.moved, 0);
        assert_eq!(outcome.skipped, 1);
        // the loose copy stays where it was
        assert!(movies.join("alien.1979.mkv").exists());
    }

    #[tokio::test]
    async fn test_organize_shows_builds_season_layout() {
        let dir = tempfile::tempdir().unwrap();
        let data_root = dir.path().join("data");
        let shows = data_root.join("shows");
        std::fs::create_dir_all(shows.join("Severance")).unwrap();
        std::fs::write(shows.join("Severance/Severance.S01E02.720p.mkv"), b"v").unwrap();
        let service = test_service(&dir, &data_root).await;

        let options = OrganizeOptions {
            dry_run: false,
            ..heuristics_only()
        };
        let outcome = service.organize_shows(&options).await.unwrap();
        assert_eq!(outcome.moved, 1);
        assert!(shows.join("Severance/Season 1/S01E02.mkv").exists());
        // the emptied source folder is gone
        assert!(!shows.join("Severance").join("Severance.S01E02.720p.mkv").exists());
    }
}
