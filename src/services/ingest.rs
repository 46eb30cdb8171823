//! Drop-folder ingest
//!
//! Watches a single flat ingest directory. Video files that appear there
//! are moved into the movies or shows tree once their size has stabilized,
//! then a forced rebuild picks them up and the organizer pass names them
//! properly. Non-video files are left alone.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::media::{Category, is_playable_video};
use crate::services::filename_parser::parse_season_episode;
use crate::services::paths::{PathResolver, move_file};
use crate::services::scheduler::BuildScheduler;

const POLL_INTERVAL: Duration = Duration::from_secs(15);
const STABILITY_INTERVAL: Duration = Duration::from_secs(2);
const STABILITY_MAX_POLLS: u32 = 30;

pub struct IngestWorker {
    ingest_dir: PathBuf,
    resolver: Arc<PathResolver>,
    scheduler: Arc<BuildScheduler>,
}

impl IngestWorker {
    pub fn new(
        ingest_dir: PathBuf,
        resolver: Arc<PathResolver>,
        scheduler: Arc<BuildScheduler>,
    ) -> Self {
        Self {
            ingest_dir,
            resolver,
            scheduler,
        }
    }

    /// Runs forever; meant to be spawned as a background task.
    pub async fn run(self) {
        info!(dir = %self.ingest_dir.display(), "ingest worker watching drop folder");
        loop {
            if let Err(e) = self.sweep().await {
                warn!(error = %e, "ingest sweep failed");
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// One pass over the drop folder. Returns how many files were routed.
    pub async fn sweep(&self) -> Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.ingest_dir).await {
            Ok(entries) => entries,
            // missing dir is not fatal, it may be mounted later
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e).context("reading ingest directory"),
        };

        let mut routed = 0usize;
        let mut touched_movies = false;
        let mut touched_shows = false;

        while let Some(entry) = entries.next_entry().await.context("iterating ingest dir")? {
            let path = entry.path();
            if !path.is_file() || !is_playable_video(&path) {
                continue;
            }
            if !self.wait_until_stable(&path).await? {
                // still being written, pick it up next sweep
                continue;
            }
            match self.route_file(&path).await {
                Ok(category) => {
                    routed += 1;
                    match category {
                        Category::Movies => touched_movies = true,
                        Category::Shows => touched_shows = true,
                        _ => {}
                    }
                }
                Err(e) => warn!(file = %path.display(), error = %e, "failed to route ingest file"),
            }
        }

        if touched_movies {
            let _ = self.scheduler.maybe_start_build(Category::Movies, true).await;
        }
        if touched_shows {
            let _ = self.scheduler.maybe_start_build(Category::Shows, true).await;
        }
        Ok(routed)
    }

    /// A file counts as stable once two consecutive size samples agree.
    /// Gives up after a bounded number of polls so one stuck transfer
    /// cannot wedge the sweep.
    async fn wait_until_stable(&self, path: &Path) -> Result<bool> {
        let mut last_size = tokio::fs::metadata(path)
            .await
            .context("reading ingest file size")?
            .len();
        for _ in 0..STABILITY_MAX_POLLS {
            tokio::time::sleep(STABILITY_INTERVAL).await;
            let size = match tokio::fs::metadata(path).await {
                Ok(meta) => meta.len(),
                // deleted out from under us
                Err(_) => return Ok(false),
            };
            if size == last_size && size > 0 {
                return Ok(true);
            }
            last_size = size;
        }
        Ok(false)
    }

    /// Moves the file into the raw movies or shows tree. The chained
    /// organize pass handles naming and metadata afterwards.
    async fn route_file(&self, path: &Path) -> Result<Category> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .context("ingest file has no usable name")?
            .to_string();

        let category = classify(&name);
        let dest_dir = self.resolver.data_root().join(category.as_str());
        tokio::fs::create_dir_all(&dest_dir)
            .await
            .context("creating ingest destination")?;

        let mut dest = dest_dir.join(&name);
        if dest.exists() {
            // do not clobber an existing file with the same name
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("ingest");
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("mkv");
            dest = dest_dir.join(format!("{stem} (ingest).{ext}"));
        }

        move_file(path, &dest)
            .await
            .with_context(|| format!("moving {} into {}", path.display(), dest.display()))?;
        info!(from = %path.display(), to = %dest.display(), category = %category, "ingested file");
        Ok(category)
    }
}

/// Episode markers route to shows, everything else is assumed a movie.
fn classify(name: &str) -> Category {
    match parse_season_episode(name) {
        (_, Some(_)) => Category::Shows,
        _ => Category::Movies,
    }
}
