//! Thumbnail pipeline
//!
//! Produces `<thumbnail_dir>/<id>.png` from page 1 of a document and keeps it
//! until the source PDF changes. An asset is fresh only while its mtime is
//! strictly newer than the source's and its `<id>.source.json` stamp names
//! the same source file with the mtime it had when rendering started. Ids
//! can move to another file (the newest edition keeps the plain id), so the
//! mtime alone cannot tell whose render an asset is.
//!
//! ```text
//! ensure_thumbnail(id)
//!     │
//!     ├─ stat asset + source ── fresh ──────────────────────► cached asset
//!     │
//!     └─ stale/missing ─► spawn ─► lock(id) ─► re-check ── fresh ──► cached asset
//!                                              │
//!                                              └─ render ─► normalize ─► temp file ─► rename ─► stamp
//! ```
//!
//! Generation runs on its own task, so a caller that goes away does not
//! cancel it; the result is still written for the next request. The per-id
//! lock makes concurrent requests for the same stale id wait for a single
//! generation instead of each rendering.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use uuid::Uuid;

use crate::library::{LibraryError, Result};

use super::normalize::normalize;
use super::renderer::{PageRenderer, RasterSpec};

/// Extension of generated previews
pub const THUMBNAIL_EXTENSION: &str = "png";

/// Suffix of the stamp recording which source an asset was rendered from
pub const STAMP_SUFFIX: &str = "source.json";

/// A generated preview on disk
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailAsset {
    pub path: PathBuf,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Source file an asset was rendered from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SourceStamp {
    filename: String,
    source_modified: DateTime<Utc>,
}

impl SourceStamp {
    fn new(pdf_path: &Path, source_modified: SystemTime) -> Self {
        Self {
            filename: pdf_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            source_modified: source_modified.into(),
        }
    }
}

#[derive(Clone)]
pub struct ThumbnailPipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    thumbnail_dir: PathBuf,
    renderer: Arc<dyn PageRenderer>,
    spec: RasterSpec,
    /// In-flight generation locks, one per document id
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ThumbnailPipeline {
    pub fn new(thumbnail_dir: impl Into<PathBuf>, renderer: Arc<dyn PageRenderer>, spec: RasterSpec) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                thumbnail_dir: thumbnail_dir.into(),
                renderer,
                spec,
                locks: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn thumbnail_dir(&self) -> &Path {
        &self.inner.thumbnail_dir
    }

    /// Canonical asset location for `id`
    pub fn asset_path(&self, id: &str) -> PathBuf {
        self.inner
            .thumbnail_dir
            .join(format!("{}.{}", id, THUMBNAIL_EXTENSION))
    }

    fn stamp_path(&self, id: &str) -> PathBuf {
        self.inner
            .thumbnail_dir
            .join(format!("{}.{}", id, STAMP_SUFFIX))
    }

    /// Return a fresh thumbnail for `id`, generating it if the cached one is
    /// missing or older than `pdf_path`.
    pub async fn ensure_thumbnail(&self, id: &str, pdf_path: &Path) -> Result<ThumbnailAsset> {
        if let Some(asset) = self.cached_asset(id, pdf_path).await? {
            tracing::debug!("Using cached thumbnail for {}", id);
            return Ok(asset);
        }

        let pipeline = self.clone();
        let id = id.to_string();
        let pdf_path = pdf_path.to_path_buf();

        tokio::spawn(async move { pipeline.generate_exclusive(&id, &pdf_path).await })
            .await
            .map_err(|e| LibraryError::Generation(format!("Task join error: {}", e)))?
    }

    /// Existing asset if it is strictly newer than the source and was
    /// rendered from it
    async fn cached_asset(&self, id: &str, pdf_path: &Path) -> Result<Option<ThumbnailAsset>> {
        let source_modified = source_modified(id, pdf_path).await?;

        let asset_path = self.asset_path(id);
        let asset_metadata = match tokio::fs::metadata(&asset_path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let asset_modified = asset_metadata.modified()?;
        if asset_modified <= source_modified {
            return Ok(None);
        }

        if self.read_stamp(id).await != Some(SourceStamp::new(pdf_path, source_modified)) {
            tracing::debug!("Thumbnail for {} was not rendered from {}", id, pdf_path.display());
            return Ok(None);
        }

        Ok(Some(ThumbnailAsset {
            path: asset_path,
            size: asset_metadata.len(),
            last_modified: asset_modified.into(),
        }))
    }

    /// Stamp of the current asset. Missing or unreadable counts as none.
    async fn read_stamp(&self, id: &str) -> Option<SourceStamp> {
        let bytes = tokio::fs::read(self.stamp_path(id)).await.ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(stamp) => Some(stamp),
            Err(e) => {
                tracing::warn!("Ignoring unreadable thumbnail stamp for {}: {}", id, e);
                None
            }
        }
    }

    async fn generate_exclusive(&self, id: &str, pdf_path: &Path) -> Result<ThumbnailAsset> {
        let lock = self.lock_for(id);
        let result = {
            let _guard = lock.lock().await;

            // Whoever held the lock before us may have just produced it
            match self.cached_asset(id, pdf_path).await {
                Ok(Some(asset)) => {
                    tracing::debug!("Thumbnail for {} generated by a concurrent request", id);
                    Ok(asset)
                }
                Ok(None) => self.generate(id, pdf_path).await,
                Err(e) => Err(e),
            }
        };
        self.release_lock(id, &lock);
        result
    }

    async fn generate(&self, id: &str, pdf_path: &Path) -> Result<ThumbnailAsset> {
        tracing::info!("Generating new thumbnail for {}", id);
        let start = std::time::Instant::now();
        let stamp = SourceStamp::new(pdf_path, source_modified(id, pdf_path).await?);

        let raster = self
            .inner
            .renderer
            .render_first_page(pdf_path)
            .await
            .map_err(|e| {
                tracing::error!("Error rendering thumbnail for {}: {}", id, e);
                LibraryError::Generation(e.to_string())
            })?;

        let RasterSpec { width, height, .. } = self.inner.spec;
        let png = tokio::task::spawn_blocking(move || normalize(raster, width, height))
            .await
            .map_err(|e| LibraryError::Generation(format!("Task join error: {}", e)))?
            .map_err(|e| {
                tracing::error!("Error normalizing thumbnail for {}: {}", id, e);
                LibraryError::Generation(e.to_string())
            })?;

        let asset_path = self.asset_path(id);
        self.replace_atomically(id, &asset_path, &png).await?;

        let stamp_bytes = serde_json::to_vec(&stamp)
            .map_err(|e| LibraryError::Generation(format!("Failed to encode stamp: {}", e)))?;
        self.replace_atomically(id, &self.stamp_path(id), &stamp_bytes)
            .await?;

        // The stamp keeps the pre-render mtime, so the next request redoes it
        if source_modified(id, pdf_path).await? != SystemTime::from(stamp.source_modified) {
            tracing::warn!(
                "{} changed while its thumbnail was rendered; regenerating on next request",
                pdf_path.display()
            );
        }

        let metadata = tokio::fs::metadata(&asset_path).await?;
        let last_modified: SystemTime = metadata.modified()?;

        tracing::info!(
            "Generated thumbnail {} ({} bytes) in {:?}",
            asset_path.display(),
            metadata.len(),
            start.elapsed()
        );

        Ok(ThumbnailAsset {
            path: asset_path,
            size: metadata.len(),
            last_modified: last_modified.into(),
        })
    }

    /// Write to a unique temp file next to the asset, then rename over it.
    /// The temp file is removed on any failure.
    async fn replace_atomically(&self, id: &str, asset_path: &Path, data: &[u8]) -> Result<()> {
        let dir = &self.inner.thumbnail_dir;
        let temp_path = dir.join(format!(".{}.{}.tmp", id, Uuid::new_v4()));

        let written = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&temp_path, data).await?;
            tokio::fs::rename(&temp_path, asset_path).await
        }
        .await;

        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&temp_path).await {
                if cleanup.kind() != ErrorKind::NotFound {
                    tracing::warn!("Failed to remove {}: {}", temp_path.display(), cleanup);
                }
            }
            return Err(LibraryError::Generation(format!(
                "Failed to write {}: {}",
                asset_path.display(),
                e
            )));
        }

        Ok(())
    }

    fn lock_for(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.inner
            .locks
            .lock()
            .entry(id.to_string())
            .or_default()
            .clone()
    }

    /// Drop the map entry once nobody else is waiting on it
    fn release_lock(&self, id: &str, lock: &Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.inner.locks.lock();
        // One reference in the map, one held by the caller
        if Arc::strong_count(lock) <= 2 {
            locks.remove(id);
        }
    }

    #[cfg(test)]
    fn pending_locks(&self) -> usize {
        self.inner.locks.lock().len()
    }
}

/// Source mtime; a vanished source is [`LibraryError::MissingFile`]
async fn source_modified(id: &str, pdf_path: &Path) -> Result<SystemTime> {
    match tokio::fs::metadata(pdf_path).await {
        Ok(metadata) => Ok(metadata.modified()?),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(LibraryError::MissingFile {
            id: id.to_string(),
            path: pdf_path.to_path_buf(),
        }),
        Err(e) => Err(e.into()),
    }
}
