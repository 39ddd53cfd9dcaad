//! Time-bounded catalog cache
//!
//! Holds the latest [`CatalogSnapshot`] and rebuilds it from disk once it is
//! older than the TTL. Snapshots are swapped in whole behind an `Arc`, so a
//! reader either sees the previous catalog or the new one.

use chrono::Duration;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::clock::Clock;

use super::document::{CatalogSnapshot, ResolvedDocument};
use super::error::{LibraryError, Result};
use super::scanner::LibraryScanner;

/// Default catalog freshness window
pub const DEFAULT_TTL_SECS: i64 = 300;

/// Thread-safe catalog cache
#[derive(Clone)]
pub struct CatalogCache {
    inner: Arc<CatalogCacheInner>,
}

struct CatalogCacheInner {
    scanner: LibraryScanner,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    snapshot: RwLock<Arc<CatalogSnapshot>>,
    /// Serializes rebuilds so an expired cache triggers one scan
    rebuild: Mutex<()>,
    scans: AtomicU64,
}

impl CatalogCache {
    pub fn new(scanner: LibraryScanner, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(CatalogCacheInner {
                scanner,
                clock,
                ttl,
                snapshot: RwLock::new(Arc::new(CatalogSnapshot::default())),
                rebuild: Mutex::new(()),
                scans: AtomicU64::new(0),
            }),
        }
    }

    pub fn scanner(&self) -> &LibraryScanner {
        &self.inner.scanner
    }

    /// Number of directory scans performed so far
    pub fn scan_count(&self) -> u64 {
        self.inner.scans.load(Ordering::Relaxed)
    }

    /// Current catalog, rebuilt from disk if older than the TTL.
    ///
    /// A fresh snapshot is returned as-is without touching the filesystem.
    pub async fn get_catalog(&self) -> Arc<CatalogSnapshot> {
        if let Some(snapshot) = self.fresh_snapshot().await {
            tracing::debug!("Catalog cache hit ({} documents)", snapshot.len());
            return snapshot;
        }

        let _guard = self.inner.rebuild.lock().await;

        // Another caller may have rebuilt while we waited
        if let Some(snapshot) = self.fresh_snapshot().await {
            return snapshot;
        }

        self.rebuild().await
    }

    /// Look up `id` in the catalog and join its filename onto the watched
    /// directory. Uses the snapshot returned by this call's own
    /// [`get_catalog`](Self::get_catalog).
    pub async fn resolve(&self, id: &str) -> Result<ResolvedDocument> {
        let snapshot = self.get_catalog().await;
        let record = snapshot
            .find(id)
            .cloned()
            .ok_or_else(|| LibraryError::UnknownId(id.to_string()))?;
        let path = self.inner.scanner.pdf_dir().join(&record.filename);

        Ok(ResolvedDocument {
            record,
            path,
            snapshot,
        })
    }

    async fn fresh_snapshot(&self) -> Option<Arc<CatalogSnapshot>> {
        let snapshot = self.inner.snapshot.read().await.clone();
        let built_at = snapshot.built_at?;
        let age = self.inner.clock.now() - built_at;
        // A clock that stepped backwards makes the age negative; rescan
        if age >= Duration::zero() && age < self.inner.ttl {
            Some(snapshot)
        } else {
            None
        }
    }

    async fn rebuild(&self) -> Arc<CatalogSnapshot> {
        let scanned_at = self.inner.clock.now();
        self.inner.scans.fetch_add(1, Ordering::Relaxed);

        let snapshot = match self.inner.scanner.scan_library(scanned_at).await {
            Ok(documents) => CatalogSnapshot {
                documents,
                built_at: Some(scanned_at),
            },
            Err(e) => {
                tracing::warn!(
                    "Library scan of {} failed: {}. Serving an empty catalog until the next scan",
                    self.inner.scanner.pdf_dir().display(),
                    e
                );
                CatalogSnapshot::default()
            }
        };

        let snapshot = Arc::new(snapshot);
        *self.inner.snapshot.write().await = snapshot.clone();
        snapshot
    }
}
