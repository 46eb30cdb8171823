//! Logical path translation and sandboxing
//!
//! Library consumers address files by logical paths rooted at `/data`.
//! This resolver is the only component allowed to translate between logical
//! and filesystem paths; everything else treats paths as opaque strings.
//!
//! Allowed roots: the primary data directory, `external/<drive>` symlink
//! shortcuts under it, and (when enabled) the host's `/media` and `/mnt`
//! mount directories.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::media::Category;

/// Sandbox violation or malformed logical path. Never retried.
#[derive(Debug, Error)]
pub enum PathError {
    #[error("malformed path: {0}")]
    Malformed(String),
    #[error("path traversal rejected: {0}")]
    Traversal(String),
    #[error("path outside allowed roots: {0}")]
    OutsideRoots(String),
}

/// System mount directories where external drives appear
const SYSTEM_MOUNT_BASES: &[&str] = &["/media", "/mnt"];

#[derive(Debug, Clone)]
pub struct PathResolver {
    data_root: PathBuf,
    allow_system_mounts: bool,
}

impl PathResolver {
    pub fn new(data_root: PathBuf, allow_system_mounts: bool) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&data_root)?;
        let data_root = data_root.canonicalize()?;
        Ok(Self {
            data_root,
            allow_system_mounts,
        })
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Translate a logical path (`/data/...`, or a bare relative form) to a
    /// filesystem path. Absolute paths under `/media` and `/mnt` pass
    /// through when system mounts are enabled.
    pub fn to_fs_path(&self, logical: &str) -> Result<PathBuf, PathError> {
        let trimmed = logical.trim().replace('\\', "/");
        if trimmed.is_empty() {
            return Err(PathError::Malformed(logical.to_string()));
        }

        if trimmed.starts_with('/') {
            let rest = trimmed.trim_start_matches('/');
            if rest == "data" {
                return Ok(self.data_root.clone());
            }
            if let Some(rel) = rest.strip_prefix("data/") {
                return self.resolve_under_root(logical, rel);
            }
            if self.allow_system_mounts
                && SYSTEM_MOUNT_BASES
                    .iter()
                    .any(|base| trimmed.starts_with(&format!("{}/", base)))
            {
                let normalized = normalize_absolute(&trimmed)
                    .ok_or_else(|| PathError::Traversal(logical.to_string()))?;
                // Re-check after normalization; "/media/../etc" must not slip
                if SYSTEM_MOUNT_BASES
                    .iter()
                    .any(|base| normalized.starts_with(base))
                {
                    return Ok(normalized);
                }
            }
            return Err(PathError::OutsideRoots(logical.to_string()));
        }

        self.resolve_under_root(logical, &trimmed)
    }

    fn resolve_under_root(&self, original: &str, rel: &str) -> Result<PathBuf, PathError> {
        let mut resolved = self.data_root.clone();
        for component in Path::new(rel).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    return Err(PathError::Traversal(original.to_string()));
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(PathError::Malformed(original.to_string()));
                }
            }
        }
        if !resolved.starts_with(&self.data_root) {
            return Err(PathError::OutsideRoots(original.to_string()));
        }
        Ok(resolved)
    }

    /// Inverse mapping. Paths under the data root become `/data/<rel>`;
    /// paths under a system mount are reconstructed as
    /// `/data/external/<drive>/...`, lazily creating the drive shortcut
    /// symlink when missing. Returns None for anything else.
    pub fn to_logical_path(&self, fs_path: &Path) -> Option<String> {
        let fs_path = if fs_path.is_absolute() {
            fs_path.to_path_buf()
        } else {
            self.data_root.join(fs_path)
        };

        if let Ok(rel) = fs_path.strip_prefix(&self.data_root) {
            return Some(format!("/data/{}", rel.to_string_lossy()));
        }

        if !self.allow_system_mounts {
            return None;
        }
        for base in SYSTEM_MOUNT_BASES {
            if let Ok(rel) = fs_path.strip_prefix(base) {
                let mut components = rel.components();
                let drive = components.next().and_then(|c| match c {
                    Component::Normal(name) => name.to_str().map(str::to_string),
                    _ => None,
                })?;
                let remainder: PathBuf = components.collect();
                self.ensure_drive_shortcut(&drive, &Path::new(base).join(&drive));
                let rest = remainder.to_string_lossy();
                return Some(if rest.is_empty() {
                    format!("/data/external/{}", drive)
                } else {
                    format!("/data/external/{}/{}", drive, rest)
                });
            }
        }
        None
    }

    /// Create `<data>/external/<drive>` pointing at the mount if it does not
    /// exist yet. Failures are logged, not fatal: the direct mount path
    /// still works.
    fn ensure_drive_shortcut(&self, drive: &str, target: &Path) {
        let external_dir = self.data_root.join("external");
        let link = external_dir.join(drive);
        if link.exists() {
            return;
        }
        if let Err(e) = std::fs::create_dir_all(&external_dir) {
            warn!(error = %e, "failed to create external shortcut directory");
            return;
        }
        #[cfg(unix)]
        if let Err(e) = std::os::unix::fs::symlink(target, &link) {
            warn!(drive = %drive, error = %e, "failed to create drive shortcut");
        } else {
            debug!(drive = %drive, target = %target.display(), "created drive shortcut");
        }
    }

    /// Existing directories to walk for a category: the primary root, a
    /// `media/<category>` alias, and a same-named (case-variant) subfolder
    /// of every external mount.
    pub fn scan_roots(&self, category: Category) -> Vec<PathBuf> {
        let mut roots = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut push = |path: PathBuf| {
            if path.is_dir() {
                let key = path.canonicalize().unwrap_or_else(|_| path.clone());
                if seen.insert(key) {
                    roots.push(path);
                }
            }
        };

        push(self.data_root.join(category.as_str()));
        push(self.data_root.join("media").join(category.as_str()));

        for mount in self.external_mounts() {
            for variant in Self::category_name_variants(category) {
                push(mount.join(variant));
            }
        }
        roots
    }

    /// Folder names an external drive might use for a category
    fn category_name_variants(category: Category) -> Vec<String> {
        let name = category.as_str();
        let mut capitalized = name.to_string();
        if let Some(first) = capitalized.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        let mut variants = vec![name.to_string(), capitalized, name.to_uppercase()];
        if category == Category::Shows {
            variants.extend(["TV Shows".to_string(), "Series".to_string(), "TV".to_string()]);
        }
        variants
    }

    /// Discover external mount directories: `external/*` shortcuts under the
    /// data root, plus `/media/*` and `/media/<user>/*` when system mounts
    /// are enabled.
    pub fn external_mounts(&self) -> Vec<PathBuf> {
        let mut mounts = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut push = |path: PathBuf| {
            if path.is_dir() {
                let key = path.canonicalize().unwrap_or_else(|_| path.clone());
                if seen.insert(key) {
                    mounts.push(path);
                }
            }
        };

        if let Ok(entries) = std::fs::read_dir(self.data_root.join("external")) {
            for entry in entries.flatten() {
                push(entry.path());
            }
        }

        if self.allow_system_mounts {
            for base in SYSTEM_MOUNT_BASES {
                let Ok(entries) = std::fs::read_dir(base) else {
                    continue;
                };
                for entry in entries.flatten() {
                    let path = entry.path();
                    // Desktop systems mount at /media/<user>/<drive>
                    if *base == "/media" {
                        if let Ok(inner) = std::fs::read_dir(&path) {
                            for drive in inner.flatten() {
                                push(drive.path());
                            }
                        }
                    }
                    push(path);
                }
            }
        }
        mounts
    }
}

/// Move a file, falling back to copy+remove when rename crosses a
/// filesystem boundary. External drives are separate mounts, so EXDEV is
/// a routine outcome there, not an error.
pub async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::CrossesDevices => {
            copy_then_remove(from, to).await
        }
        Err(err) => Err(err),
    }
}

async fn copy_then_remove(from: &Path, to: &Path) -> std::io::Result<()> {
    tokio::fs::copy(from, to).await?;
    tokio::fs::remove_file(from).await
}

fn normalize_absolute(path: &str) -> Option<PathBuf> {
    let mut normalized = PathBuf::from("/");
    for component in Path::new(path).components() {
        match component {
            Component::RootDir => {}
            Component::CurDir => {}
            Component::Normal(part) => normalized.push(part),
            Component::ParentDir | Component::Prefix(_) => return None,
        }
    }
    Some(normalized)
}
