//! Content-addressed poster cache
//!
//! Posters are cached under `<data>/cache/posters/` keyed by the sha256 of
//! the source URL, so records pointing at the same provider image share one
//! file. URLs that already failed this process run are not retried.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Downloads larger than this are rejected
pub const MAX_POSTER_BYTES: u64 = 5 * 1024 * 1024;

const EXTENSIONS: &[&str] = &["jpg", "png", "webp", "gif"];

pub struct PosterCache {
    client: reqwest::Client,
    cache_dir: PathBuf,
    /// URLs attempted this run, successful or not
    attempted: Mutex<HashSet<String>>,
}

impl PosterCache {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            client: reqwest::Client::new(),
            cache_dir,
            attempted: Mutex::new(HashSet::new()),
        }
    }

    fn key_for(url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Existing cached file for a URL, if any
    pub fn cached_path(&self, url: &str) -> Option<PathBuf> {
        let key = Self::key_for(url);
        EXTENSIONS
            .iter()
            .map(|ext| self.cache_dir.join(format!("{}.{}", key, ext)))
            .find(|p| p.exists())
    }

    /// Fetch a poster into the cache, returning the cached file path.
    /// Returns the existing file without touching the network when the URL
    /// was cached earlier; returns None when the URL already failed this
    /// run.
    pub async fn fetch(&self, url: &str) -> Result<Option<PathBuf>> {
        if let Some(existing) = self.cached_path(url) {
            return Ok(Some(existing));
        }
        if !self.attempted.lock().insert(url.to_string()) {
            return Ok(None);
        }

        match self.download(url).await {
            Ok(path) => Ok(Some(path)),
            Err(e) => {
                warn!(url = %url, error = %e, "poster download failed");
                Ok(None)
            }
        }
    }

    async fn download(&self, url: &str) -> Result<PathBuf> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .context("poster request failed")?
            .error_for_status()
            .context("poster request rejected")?;

        if let Some(length) = response.content_length() {
            if length > MAX_POSTER_BYTES {
                bail!("poster exceeds size cap: {} bytes", length);
            }
        }

        let mut bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await.context("poster read failed")? {
            if (bytes.len() + chunk.len()) as u64 > MAX_POSTER_BYTES {
                bail!("poster exceeds size cap");
            }
            bytes.extend_from_slice(&chunk);
        }
        if bytes.is_empty() {
            bail!("empty poster body");
        }

        let extension = infer::get(&bytes)
            .map(|kind| kind.extension())
            .filter(|ext| EXTENSIONS.contains(ext))
            .unwrap_or("jpg");

        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .context("failed to create poster cache directory")?;
        let path = self
            .cache_dir
            .join(format!("{}.{}", Self::key_for(url), extension));
        tokio::fs::write(&path, &bytes)
            .await
            .context("failed to write cached poster")?;
        debug!(url = %url, path = %path.display(), "poster cached");
        Ok(path)
    }
}
