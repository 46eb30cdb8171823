//! Index build scheduling
//!
//! At most one background build runs per category. The per-category flags
//! live in a single registry behind a mutex; nothing else touches them.
//! There is deliberately no periodic rebuild timer: builds happen on
//! request, and a category with a non-empty index is considered fresh
//! unless the caller forces a rebuild.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{error, info};

use crate::db::Database;
use crate::media::Category;
use crate::services::organizer::{OrganizeOptions, OrganizerService};
use crate::services::scanner::IndexBuilder;

/// Outcome of a build request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    /// A background worker was started
    Started,
    /// A build for this category is already running
    Building,
    /// The index is populated and the caller did not force a rebuild
    Fresh,
}

/// Process-wide build flags plus a generation counter consumers use to
/// invalidate pagination caches. All access goes through the atomic
/// check-and-set methods here.
#[derive(Default)]
pub struct BuildRegistry {
    building: Mutex<HashSet<Category>>,
    generation: AtomicU64,
}

impl BuildRegistry {
    /// Atomically claim the category; false when a build is in flight
    pub fn try_begin(&self, category: Category) -> bool {
        self.building.lock().insert(category)
    }

    pub fn finish(&self, category: Category) {
        self.building.lock().remove(&category);
    }

    pub fn is_building(&self, category: Category) -> bool {
        self.building.lock().contains(&category)
    }

    /// Bumped on every index mutation
    pub fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::Relaxed);
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }
}

pub struct BuildScheduler {
    db: Database,
    builder: Arc<IndexBuilder>,
    organizer: Arc<OrganizerService>,
    registry: Arc<BuildRegistry>,
}

impl BuildScheduler {
    pub fn new(
        db: Database,
        builder: Arc<IndexBuilder>,
        organizer: Arc<OrganizerService>,
    ) -> Arc<Self> {
        Arc::new(Self {
            db,
            builder,
            organizer,
            registry: Arc::new(BuildRegistry::default()),
        })
    }

    pub fn registry(&self) -> Arc<BuildRegistry> {
        self.registry.clone()
    }

    /// Start a background build for the category unless one is running or
    /// the index is still fresh.
    pub async fn maybe_start_build(
        self: &Arc<Self>,
        category: Category,
        force: bool,
    ) -> Result<BuildStatus> {
        if !self.registry.try_begin(category) {
            return Ok(BuildStatus::Building);
        }

        if !force {
            let populated = self
                .db
                .index_state()
                .get(category)
                .await
                .map(|s| s.map(|s| s.item_count > 0).unwrap_or(false));
            match populated {
                Ok(true) => {
                    self.registry.finish(category);
                    return Ok(BuildStatus::Fresh);
                }
                Ok(false) => {}
                Err(e) => {
                    self.registry.finish(category);
                    return Err(e);
                }
            }
        }

        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.run_build(category).await;
            scheduler.registry.finish(category);
        });
        Ok(BuildStatus::Started)
    }

    async fn run_build(&self, category: Category) {
        match self.builder.build_index(category).await {
            Ok(count) => {
                info!(category = %category, count, "scheduled build finished");
            }
            Err(e) => {
                error!(category = %category, error = %e, "scheduled build failed");
                self.registry.bump_generation();
                return;
            }
        }

        // Movies and shows converge toward the canonical layout right after
        // a rebuild
        if matches!(category, Category::Movies | Category::Shows) {
            let options = OrganizeOptions {
                dry_run: false,
                ..OrganizeOptions::default()
            };
            if let Err(e) = self.organizer.organize(category, &options).await {
                error!(category = %category, error = %e, "chained organize pass failed");
            }
        }
        self.registry.bump_generation();
    }
}
