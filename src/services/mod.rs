//! Library services

pub mod filename_parser;
pub mod ingest;
pub mod matcher;
pub mod omdb;
pub mod organizer;
pub mod paths;
pub mod posters;
pub mod scanner;
pub mod scheduler;
pub mod text_utils;

pub use ingest::IngestWorker;
pub use matcher::MetadataMatcher;
pub use omdb::OmdbClient;
pub use organizer::OrganizerService;
pub use paths::PathResolver;
pub use posters::PosterCache;
pub use scanner::IndexBuilder;
pub use scheduler::{BuildRegistry, BuildScheduler};
