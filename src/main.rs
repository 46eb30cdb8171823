//! Curator - media library indexer and organizer
//!
//! Scans category roots under the data directory, builds a queryable
//! SQLite index, matches movies and shows against OMDb, and converges the
//! on-disk layout toward a canonical naming scheme.

mod api;
mod config;
mod db;
mod media;
mod services;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;
use crate::services::{
    BuildRegistry, BuildScheduler, IndexBuilder, IngestWorker, MetadataMatcher, OmdbClient,
    OrganizerService, PathResolver, PosterCache,
};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub resolver: Arc<PathResolver>,
    pub organizer: Arc<OrganizerService>,
    pub scheduler: Arc<BuildScheduler>,
    pub registry: Arc<BuildRegistry>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "curator=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    tracing::info!("Starting Curator");

    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;
    tracing::info!("Database connected and migrated");

    let resolver = Arc::new(PathResolver::new(
        config.data_dir.clone(),
        config.allow_system_mounts,
    )?);
    tracing::info!(data_root = %resolver.data_root().display(), "Path resolver initialized");

    // Metadata matching is optional; without an API key the organizer
    // still runs on filename heuristics alone.
    let matcher = config.omdb_api_key.as_ref().map(|key| {
        Arc::new(MetadataMatcher::new(Arc::new(OmdbClient::new(
            config.omdb_base_url.clone(),
            key.clone(),
        ))))
    });
    if matcher.is_none() {
        tracing::warn!("OMDB_API_KEY not set, metadata matching disabled");
    }

    let posters = Arc::new(PosterCache::new(config.data_dir.join("cache").join("posters")));
    let builder = Arc::new(IndexBuilder::new(db.clone(), resolver.clone()));
    let organizer = Arc::new(OrganizerService::new(
        db.clone(),
        resolver.clone(),
        matcher,
        posters,
    ));
    let scheduler = BuildScheduler::new(db.clone(), builder, organizer.clone());
    let registry = scheduler.registry();

    if let Some(ingest_dir) = config.ingest_dir.clone() {
        let worker = IngestWorker::new(ingest_dir, resolver.clone(), scheduler.clone());
        tokio::spawn(worker.run());
        tracing::info!("Ingest worker started");
    }

    let state = AppState {
        db,
        resolver,
        organizer,
        scheduler,
        registry,
    };

    let app = Router::new()
        .merge(api::router())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
