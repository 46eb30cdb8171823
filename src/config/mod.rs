//! Application configuration management

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Database URL (SQLite)
    pub database_url: String,

    /// Primary library data root; all logical paths resolve under it
    pub data_dir: PathBuf,

    /// OMDb API key; metadata lookups are skipped when unset
    pub omdb_api_key: Option<String>,

    /// OMDb endpoint, overridable for tests
    pub omdb_base_url: String,

    /// Allow absolute paths under /media and /mnt (external drives)
    pub allow_system_mounts: bool,

    /// Drop folder watched by the ingest worker; disabled when unset
    pub ingest_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| {
            let path = env::var("DATABASE_PATH").unwrap_or_else(|_| "./curator.db".to_string());
            format!("sqlite://{}?mode=rwc", path)
        });

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),

            port: env::var("PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .context("Invalid PORT")?,

            database_url,

            data_dir: PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string())),

            omdb_api_key: env::var("OMDB_API_KEY").ok().filter(|k| !k.is_empty()),

            omdb_base_url: env::var("OMDB_BASE_URL")
                .unwrap_or_else(|_| "https://www.omdbapi.com/".to_string()),

            allow_system_mounts: env::var("ALLOW_SYSTEM_MOUNTS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),

            ingest_dir: env::var("INGEST_DIR").ok().map(PathBuf::from),
        })
    }
}
