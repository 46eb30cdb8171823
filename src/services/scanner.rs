//! Filesystem scanner and index builder
//!
//! Walks every root for a category, applies the category's extension
//! allow-list, and rebuilds the library index from scratch. The walk runs
//! on a blocking task; database writes are batched afterwards.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::db::{CreateIndexEntry, Database};
use crate::media::Category;
use crate::services::filename_parser::guess_title_year;
use crate::services::paths::PathResolver;

/// A qualifying file found during the collection pass
#[derive(Debug, Clone)]
struct DiscoveredFile {
    logical_path: String,
    name: String,
    folder: String,
    source: String,
    size: Option<i64>,
    mtime: Option<f64>,
    poster: Option<String>,
}

/// Folder names that mean "category root", not a grouping folder
const ROOT_SYNONYMS: &[&str] = &[
    "shows", "series", "tv", "television", "serien", "movies", "media",
];

pub struct IndexBuilder {
    db: Database,
    resolver: Arc<PathResolver>,
}

impl IndexBuilder {
    pub fn new(db: Database, resolver: Arc<PathResolver>) -> Self {
        Self { db, resolver }
    }

    /// Full rebuild of a category: clear, walk, enrich, batch-upsert, and
    /// record the build state. Returns the indexed item count.
    pub async fn build_index(&self, category: Category) -> Result<i64> {
        let roots = self.resolver.scan_roots(category);
        info!(category = %category, roots = roots.len(), "index build started");

        self.db
            .library_index()
            .clear_category(category)
            .await
            .context("failed to clear category")?;

        let resolver = self.resolver.clone();
        let discovered = tokio::task::spawn_blocking(move || {
            let mut files = Vec::new();
            for root in &roots {
                collect_root(&resolver, category, root, &mut files);
            }
            files
        })
        .await
        .context("scan task panicked")?;

        // Carry over genre/year and a cached poster from provider metadata
        let metadata_repo = self.db.file_metadata();
        let mut entries = Vec::with_capacity(discovered.len());
        for file in discovered {
            let cached = metadata_repo.get(&file.logical_path).await.ok().flatten();
            let (mut genre, mut year) = (None, None);
            let mut poster = file.poster;
            if let Some(cached) = cached {
                genre = cached.genre;
                year = cached.year;
                if poster.is_none() {
                    poster = cached.poster;
                }
            }
            if year.is_none() && category == Category::Movies {
                let (_, guessed_year) = guess_title_year(&file.name);
                year = guessed_year;
            }
            entries.push(CreateIndexEntry {
                path: file.logical_path,
                category,
                name: file.name,
                folder: file.folder,
                source: file.source,
                poster,
                mtime: file.mtime,
                size: file.size,
                genre,
                year,
            });
        }

        self.db
            .library_index()
            .upsert_batch(&entries)
            .await
            .context("failed to write index entries")?;
        let count = entries.len() as i64;
        self.db.index_state().write(category, count).await?;

        info!(category = %category, count, "index build complete");
        Ok(count)
    }
}

fn collect_root(
    resolver: &PathResolver,
    category: Category,
    root: &Path,
    files: &mut Vec<DiscoveredFile>,
) {
    let walker = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry.path()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "walk error, entry skipped");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(ext) = crate::media::extension_of(path) else {
            continue;
        };
        if !category.accepts(&ext) {
            continue;
        }

        let Some(logical_path) = resolver.to_logical_path(path) else {
            warn!(path = %path.display(), "no logical mapping, file skipped");
            continue;
        };
        let name = entry.file_name().to_string_lossy().to_string();
        let folder = grouping_folder(category, root, path);
        let source = if logical_path.starts_with("/data/external/") {
            "external".to_string()
        } else {
            "local".to_string()
        };

        let (size, mtime) = match entry.metadata() {
            Ok(meta) => {
                let mtime = meta
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| d.as_secs_f64());
                (Some(meta.len() as i64), mtime)
            }
            Err(_) => (None, None),
        };

        let poster = find_poster(path).and_then(|p| resolver.to_logical_path(&p));

        files.push(DiscoveredFile {
            logical_path,
            name,
            folder,
            source,
            size,
            mtime,
            poster,
        });
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// Relative grouping folder for a file, with category-root synonyms
/// stripped so "shows/Breaking Bad/Season 1" groups as
/// "Breaking Bad/Season 1".
fn grouping_folder(category: Category, root: &Path, path: &Path) -> String {
    let rel_dir = path
        .parent()
        .and_then(|dir| dir.strip_prefix(root).ok())
        .unwrap_or_else(|| Path::new(""));

    let mut parts: Vec<&str> = rel_dir.iter().filter_map(|c| c.to_str()).collect();

    if category == Category::Shows || category == Category::Movies {
        while let Some(first) = parts.first() {
            if ROOT_SYNONYMS.contains(&first.to_lowercase().as_str()) {
                parts.remove(0);
            } else {
                break;
            }
        }
    }
    parts.join("/")
}

/// Cascading poster lookup: an image sharing the file's stem, then a
/// well-known image in the file's directory, then in the parent directory.
fn find_poster(path: &Path) -> Option<PathBuf> {
    const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png"];
    const DIR_IMAGES: &[&str] = &["poster", "folder", "cover"];

    let dir = path.parent()?;
    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
        for ext in IMAGE_EXTS {
            let candidate = dir.join(format!("{}.{}", stem, ext));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }

    for base in [Some(dir), dir.parent()].into_iter().flatten() {
        for name in DIR_IMAGES {
            for ext in IMAGE_EXTS {
                let candidate = base.join(format!("{}.{}", name, ext));
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_grouping_folder_strips_root_synonyms() {
        let root = Path::new("/data/shows");
        let file = Path::new("/data/shows/shows/Breaking Bad/Season 1/e01.mkv");
        assert_eq!(
            grouping_folder(Category::Shows, root, file),
            "Breaking Bad/Season 1"
        );
    }

    #[test]
    fn test_grouping_folder_plain() {
        let root = Path::new("/data/music");
        let file = Path::new("/data/music/Artist/Album/track.mp3");
        assert_eq!(grouping_folder(Category::Music, root, file), "Artist/Album");
    }

    #[test]
    fn test_grouping_folder_top_level() {
        let root = Path::new("/data/movies");
        let file = Path::new("/data/movies/alien.mkv");
        assert_eq!(grouping_folder(Category::Movies, root, file), "");
    }

    #[test]
    fn test_hidden_detection() {
        assert!(is_hidden(Path::new("/data/movies/.trash")));
        assert!(!is_hidden(Path::new("/data/movies/alien.mkv")));
    }

    #[test]
    fn test_find_poster_prefers_stem_image() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("alien.mkv");
        std::fs::write(&video, b"v").unwrap();
        std::fs::write(dir.path().join("poster.jpg"), b"p").unwrap();
        std::fs::write(dir.path().join("alien.jpg"), b"s").unwrap();
        assert_eq!(find_poster(&video), Some(dir.path().join("alien.jpg")));
    }

    #[test]
    fn test_find_poster_falls_back_to_dir_image() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("alien.mkv");
        std::fs::write(&video, b"v").unwrap();
        std::fs::write(dir.path().join("cover.png"), b"p").unwrap();
        assert_eq!(find_poster(&video), Some(dir.path().join("cover.png")));
    }

    async fn test_db(dir: &tempfile::TempDir) -> Database {
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
        let db = Database::connect(&url).await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    fn seed_movie_tree(data_root: &Path) {
        let movies = data_root.join("movies");
        std::fs::create_dir_all(movies.join("Heat (1995)")).unwrap();
        std::fs::write(movies.join("Heat (1995)/Heat (1995).mkv"), b"video").unwrap();
        std::fs::write(movies.join("alien.1979.mkv"), b"video").unwrap();
        // wrong extension and hidden files never qualify
        std::fs::write(movies.join("notes.txt"), b"text").unwrap();
        std::fs::write(movies.join(".hidden.mkv"), b"video").unwrap();
    }

    #[tokio::test]
    async fn test_build_index_movies() {
        let dir = tempfile::tempdir().unwrap();
        let data_root = dir.path().join("data");
        seed_movie_tree(&data_root);

        let db = test_db(&dir).await;
        let resolver = Arc::new(PathResolver::new(data_root, false).unwrap());
        let builder = IndexBuilder::new(db.clone(), resolver);

        let count = builder.build_index(Category::Movies).await.unwrap();
        assert_eq!(count, 2);

        let heat = get_entry(&db, "/data/movies/Heat (1995)/Heat (1995).mkv").await;
        assert_eq!(heat.folder, "Heat (1995)");
        assert_eq!(heat.source, "local");
        assert_eq!(heat.year.as_deref(), Some("1995"));

        let alien = get_entry(&db, "/data/movies/alien.1979.mkv").await;
        assert_eq!(alien.folder, "");
        assert_eq!(alien.year.as_deref(), Some("1979"));

        let state = db
            .index_state()
            .get(Category::Movies)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.item_count, 2);
    }

    #[tokio::test]
    async fn test_build_index_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let data_root = dir.path().join("data");
        seed_movie_tree(&data_root);

        let db = test_db(&dir).await;
        let resolver = Arc::new(PathResolver::new(data_root, false).unwrap());
        let builder = IndexBuilder::new(db.clone(), resolver);

        let first = builder.build_index(Category::Movies).await.unwrap();
        let second = builder.build_index(Category::Movies).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            db.library_index()
                .count_category(Category::Movies)
                .await
                .unwrap(),
            second
        );
    }

    async fn get_entry(db: &Database, path: &str) -> crate::db::IndexEntryRecord {
        db.library_index().get(path).await.unwrap().unwrap()
    }
}
