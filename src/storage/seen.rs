//! Seen-set store.
//!
//! Process-wide set of listing links that were already delivered, persisted
//! to a single JSON file. The set is loaded once at startup and written
//! atomically after every insert, while the lock is held.
//!
//! ## File format
//!
//! ```text
//! {
//!   "updated_at": "2026-10-18T12:00:00Z",
//!   "count": 2,
//!   "links": ["https://.../ID1.html", "https://.../ID2.html"]
//! }
//! ```
//!
//! A missing file starts an empty set. An unreadable or malformed file also
//! starts an empty set with a warning; the only consequence is that listings
//! seen before the corruption are delivered again.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};

/// On-disk representation of the seen-set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeenFile {
    pub updated_at: DateTime<Utc>,
    pub count: usize,
    pub links: Vec<String>,
}

impl SeenFile {
    fn from_set(links: &HashSet<String>) -> Self {
        let mut links: Vec<String> = links.iter().cloned().collect();
        links.sort();
        Self {
            updated_at: Utc::now(),
            count: links.len(),
            links,
        }
    }
}

/// Durable set of delivered listing links.
#[derive(Debug)]
pub struct SeenStore {
    path: Option<PathBuf>,
    links: Mutex<HashSet<String>>,
}

impl SeenStore {
    /// Create a store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            links: Mutex::new(HashSet::new()),
        }
    }

    /// Load the store from `path`, falling back to an empty set.
    ///
    /// Never fails: a missing file is a first run, a corrupt one is logged.
    pub async fn load_or_empty(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let links = Self::load_links(&path).await;
        Self {
            path: Some(path),
            links: Mutex::new(links),
        }
    }

    /// Load the links from `path` into a store that never writes back.
    pub async fn load_detached(path: impl AsRef<Path>) -> Self {
        Self {
            path: None,
            links: Mutex::new(Self::load_links(path.as_ref()).await),
        }
    }

    async fn load_links(path: &Path) -> HashSet<String> {
        match Self::read(path).await {
            Ok(Some(file)) => {
                log::info!(
                    "Loaded {} seen links from {}",
                    file.links.len(),
                    path.display()
                );
                file.links.into_iter().collect()
            }
            Ok(None) => {
                log::info!("No seen-set at {}, starting empty", path.display());
                HashSet::new()
            }
            Err(e) => {
                log::warn!(
                    "Seen-set at {} is unreadable ({}); starting empty, old listings may be re-sent",
                    path.display(),
                    e
                );
                HashSet::new()
            }
        }
    }

    /// Backing file, if persistent.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn contains(&self, link: &str) -> bool {
        self.links.lock().await.contains(link)
    }

    pub async fn len(&self) -> usize {
        self.links.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.links.lock().await.is_empty()
    }

    /// Insert a link and persist before returning.
    ///
    /// Returns `Ok(false)` if the link was already present (nothing written).
    /// On a write error the link stays in memory and the error is returned;
    /// the next successful write includes it.
    pub async fn mark_seen(&self, link: &str) -> Result<bool> {
        let mut links = self.links.lock().await;
        if !links.insert(link.to_string()) {
            return Ok(false);
        }

        if let Some(path) = &self.path {
            Self::write(path, &SeenFile::from_set(&links)).await?;
        }
        Ok(true)
    }

    /// Persist the current set.
    pub async fn flush(&self) -> Result<()> {
        let links = self.links.lock().await;
        if let Some(path) = &self.path {
            Self::write(path, &SeenFile::from_set(&links)).await?;
        }
        Ok(())
    }

    /// Read the file, returning None if it doesn't exist.
    async fn read(path: &Path) -> Result<Option<SeenFile>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Write atomically (write to temp, then rename).
    async fn write(path: &Path, file: &SeenFile) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let bytes = serde_json::to_vec_pretty(file)?;
        let tmp = path.with_extension("tmp");
        let mut out = tokio::fs::File::create(&tmp).await?;
        out.write_all(&bytes).await?;
        out.flush().await?;
        out.sync_all().await?;
        drop(out);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}
