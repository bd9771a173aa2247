//! Image index
//!
//! Recursive image discovery under the configured image root. The current
//! list is held as an immutable [`ImageSnapshot`]; `rebuild()` scans without
//! holding any lock and then swaps the new snapshot in, so concurrent readers
//! always see one complete list.

use chrono::{DateTime, Utc};
use labeler_common::{Error, Result};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// File extensions treated as images (compared case-insensitively)
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// Check extension against the allow-list
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Immutable list of image ids (relative, `/`-separated paths)
#[derive(Debug)]
pub struct ImageSnapshot {
    images: Vec<String>,
    built_at: DateTime<Utc>,
}

impl ImageSnapshot {
    pub fn new(images: Vec<String>) -> Self {
        Self {
            images,
            built_at: Utc::now(),
        }
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }
}

/// In-memory index of the images under one root directory
#[derive(Debug)]
pub struct ImageIndex {
    root: PathBuf,
    current: RwLock<Arc<ImageSnapshot>>,
}

impl ImageIndex {
    /// Scan `root` and build the initial snapshot
    ///
    /// An unreadable root is a configuration error.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let images = scan_images(&root)?;
        info!("Images found: {} in {}", images.len(), root.display());

        Ok(Self {
            root,
            current: RwLock::new(Arc::new(ImageSnapshot::new(images))),
        })
    }

    /// Build an index over a fixed list without touching the filesystem
    pub fn from_images(root: impl Into<PathBuf>, images: Vec<String>) -> Self {
        Self {
            root: root.into(),
            current: RwLock::new(Arc::new(ImageSnapshot::new(images))),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Current snapshot
    pub fn list(&self) -> Arc<ImageSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.list().is_empty()
    }

    /// Rescan the root and replace the snapshot, returning the new count
    ///
    /// Blocking; run it on the blocking thread pool from async code. On error
    /// the previous snapshot stays in place.
    pub fn rebuild(&self) -> Result<usize> {
        let images = scan_images(&self.root)?;
        let count = images.len();
        let snapshot = Arc::new(ImageSnapshot::new(images));

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = snapshot;

        info!("Image index rebuilt: {} images in {}", count, self.root.display());
        Ok(count)
    }
}

/// Walk `root` recursively and collect image ids, sorted
///
/// Unreadable entries are logged and skipped. Symlinks are not followed.
pub fn scan_images(root: &Path) -> Result<Vec<String>> {
    std::fs::read_dir(root).map_err(|e| {
        Error::Config(format!("Image root {} is not readable: {}", root.display(), e))
    })?;

    let mut images = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() || !is_image_path(entry.path()) {
            continue;
        }

        match relative_id(root, entry.path()) {
            Some(id) => images.push(id),
            None => warn!("Skipping non UTF-8 path: {}", entry.path().display()),
        }
    }

    images.sort();
    debug!("Scan of {} complete: {} images", root.display(), images.len());

    Ok(images)
}

/// Relative path from `root` joined with `/`
fn relative_id(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            _ => return None,
        }
    }
    Some(parts.join("/"))
}
