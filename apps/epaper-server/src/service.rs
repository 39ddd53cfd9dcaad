//! Catalog service
//!
//! The operations the HTTP layer calls. Each one resolves the id against the
//! catalog first and keeps "unknown id" apart from "file missing on disk".

use futures::future::join_all;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::library::{
    CatalogCache, CatalogSnapshot, DescriptorLoader, DocumentRecord, EpaperDescriptor,
    LibraryError, ResolvedDocument, Result,
};
use crate::thumbnail::{ThumbnailAsset, ThumbnailPipeline};

/// A catalog document together with its sidecar, if any
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub record: DocumentRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<EpaperDescriptor>,
}

/// A document file ready to be streamed
#[derive(Debug, Clone)]
pub struct DocumentFile {
    pub path: PathBuf,
    pub size: u64,
    pub filename: String,
}

#[derive(Clone)]
pub struct CatalogService {
    catalog: CatalogCache,
    descriptors: DescriptorLoader,
    thumbnails: ThumbnailPipeline,
}

impl CatalogService {
    pub fn new(catalog: CatalogCache, thumbnails: ThumbnailPipeline) -> Self {
        Self {
            descriptors: DescriptorLoader::new(catalog.clone()),
            catalog,
            thumbnails,
        }
    }

    pub fn catalog(&self) -> &CatalogCache {
        &self.catalog
    }

    pub fn thumbnails(&self) -> &ThumbnailPipeline {
        &self.thumbnails
    }

    /// All documents still on disk, with current file sizes and their
    /// descriptors.
    ///
    /// A file removed since the last scan is left out. A descriptor that
    /// fails to load is logged and omitted rather than failing the listing.
    pub async fn list_catalog(&self) -> Vec<CatalogEntry> {
        let snapshot: Arc<CatalogSnapshot> = self.catalog.get_catalog().await;
        let pdf_dir = self.catalog.scanner().pdf_dir();

        let entries = join_all(snapshot.documents.iter().map(|record| async move {
            let file_size = listed_size(&pdf_dir.join(&record.filename), record).await?;
            let descriptor = match self.descriptors.load_record(record).await {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    tracing::warn!("Skipping descriptor for {}: {}", record.id, e);
                    None
                }
            };
            Some(CatalogEntry {
                record: record.with_file_size(file_size),
                descriptor,
            })
        }))
        .await;

        entries.into_iter().flatten().collect()
    }

    /// Locate the PDF for `id` and confirm it is still on disk
    pub async fn resolve_and_stream(&self, id: &str) -> Result<DocumentFile> {
        let resolved = self.catalog.resolve(id).await?;
        let size = require_on_disk(&resolved).await?;

        Ok(DocumentFile {
            path: resolved.path,
            size,
            filename: resolved.record.filename,
        })
    }

    /// Catalog record for `id` with its size re-read from disk
    pub async fn get_metadata(&self, id: &str) -> Result<DocumentRecord> {
        let resolved = self.catalog.resolve(id).await?;
        let size = require_on_disk(&resolved).await?;
        Ok(resolved.record.with_file_size(size))
    }

    /// Sidecar descriptor for `id`
    pub async fn get_descriptor(&self, id: &str) -> Result<EpaperDescriptor> {
        self.descriptors
            .load(id)
            .await?
            .ok_or_else(|| LibraryError::DescriptorNotFound(id.to_string()))
    }

    /// Fresh first-page thumbnail for `id`
    pub async fn get_thumbnail(&self, id: &str) -> Result<ThumbnailAsset> {
        let resolved = self.catalog.resolve(id).await?;
        self.thumbnails
            .ensure_thumbnail(&resolved.record.id, &resolved.path)
            .await
    }
}

/// Size of a regular file, `None` if it does not exist
async fn current_size(path: &Path) -> std::io::Result<Option<u64>> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => Ok(Some(metadata.len())),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Size to list for `record`, `None` if its file is gone.
///
/// A stat failure other than not-found keeps the size from the last scan.
async fn listed_size(path: &Path, record: &DocumentRecord) -> Option<u64> {
    match current_size(path).await {
        Ok(Some(size)) => Some(size),
        Ok(None) => {
            tracing::warn!("{} removed since the last scan, not listing it", record.filename);
            None
        }
        Err(e) => {
            tracing::warn!(
                "Could not stat {}: {}. Listing size from the last scan",
                path.display(),
                e
            );
            Some(record.file_size)
        }
    }
}

async fn require_on_disk(resolved: &ResolvedDocument) -> Result<u64> {
    current_size(&resolved.path)
        .await?
        .ok_or_else(|| LibraryError::MissingFile {
            id: resolved.record.id.clone(),
            path: resolved.path.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::library::{LibraryScanner, DEFAULT_TTL_SECS};
    use crate::thumbnail::{PageRenderer, RasterSpec, RenderError};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use image::{DynamicImage, Rgb, RgbImage};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration as StdDuration, SystemTime};
    use tempfile::TempDir;

    /// Fails with `NoPages` unless `pages` is set; counts every call
    #[derive(Default)]
    struct CountingRenderer {
        calls: AtomicUsize,
        pages: bool,
    }

    #[async_trait]
    impl PageRenderer for CountingRenderer {
        async fn render_first_page(&self, _path: &Path) -> std::result::Result<DynamicImage, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.pages {
                return Err(RenderError::NoPages);
            }
            Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 60, Rgb([20, 40, 60]))))
        }
    }

    struct Fixture {
        dir: TempDir,
        clock: ManualClock,
        renderer: Arc<CountingRenderer>,
        service: CatalogService,
    }

    fn fixture() -> Fixture {
        fixture_with(CountingRenderer::default())
    }

    fn fixture_with(renderer: CountingRenderer) -> Fixture {
        let dir = TempDir::new().unwrap();
        let pdf_dir = dir.path().join("pdfs");
        std::fs::create_dir(&pdf_dir).unwrap();
        std::fs::write(pdf_dir.join("23-07-2025-Koeln-Rechtsrheinisch.pdf"), b"%PDF-1.4 koeln").unwrap();
        std::fs::write(
            pdf_dir.join("23-07-2025-Koeln-Rechtsrheinisch.json"),
            br#"{"region": "rechtsrheinisch"}"#,
        )
        .unwrap();
        std::fs::write(pdf_dir.join("cologne.pdf"), b"%PDF-1.4").unwrap();

        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 7, 25, 6, 0, 0).unwrap());
        let catalog = CatalogCache::new(
            LibraryScanner::new(&pdf_dir),
            Arc::new(clock.clone()),
            Duration::seconds(DEFAULT_TTL_SECS),
        );
        let renderer = Arc::new(renderer);
        let thumbnails = ThumbnailPipeline::new(
            dir.path().join("thumbnails"),
            renderer.clone(),
            RasterSpec::default(),
        );

        Fixture {
            clock,
            renderer,
            service: CatalogService::new(catalog, thumbnails),
            dir,
        }
    }

    #[tokio::test]
    async fn test_list_catalog_refreshes_size_and_attaches_descriptor() {
        let f = fixture();
        // Warm the cache, then grow a file behind its back
        f.service.catalog().get_catalog().await;
        std::fs::write(f.dir.path().join("pdfs/cologne.pdf"), b"%PDF-1.4 larger now").unwrap();

        let entries = f.service.list_catalog().await;
        assert_eq!(entries.len(), 2);

        let cologne = entries.iter().find(|e| e.record.id == "cologne").unwrap();
        assert_eq!(cologne.record.file_size, 19);
        assert!(cologne.descriptor.is_none());

        let koeln = entries
            .iter()
            .find(|e| e.record.id == "koeln-rechtsrheinisch")
            .unwrap();
        assert_eq!(koeln.descriptor, Some(json!({"region": "rechtsrheinisch"})));
    }

    #[tokio::test]
    async fn test_resolve_and_stream() {
        let f = fixture();
        let file = f.service.resolve_and_stream("koeln-rechtsrheinisch").await.unwrap();
        assert_eq!(file.filename, "23-07-2025-Koeln-Rechtsrheinisch.pdf");
        assert_eq!(file.size, 14);
    }

    #[tokio::test]
    async fn test_unknown_and_missing_are_distinct() {
        let f = fixture();
        let err = f.service.resolve_and_stream("bonn").await.unwrap_err();
        assert!(matches!(err, LibraryError::UnknownId(_)));

        f.service.catalog().get_catalog().await;
        std::fs::remove_file(f.dir.path().join("pdfs/cologne.pdf")).unwrap();

        let err = f.service.resolve_and_stream("cologne").await.unwrap_err();
        assert!(matches!(err, LibraryError::MissingFile { .. }));
        let err = f.service.get_metadata("cologne").await.unwrap_err();
        assert!(matches!(err, LibraryError::MissingFile { .. }));
    }

    #[tokio::test]
    async fn test_descriptor_absent_vs_present() {
        let f = fixture();
        let err = f.service.get_descriptor("cologne").await.unwrap_err();
        assert!(matches!(err, LibraryError::DescriptorNotFound(_)));

        let descriptor = f.service.get_descriptor("koeln-rechtsrheinisch").await.unwrap();
        assert_eq!(descriptor["region"], "rechtsrheinisch");
    }

    #[tokio::test]
    async fn test_thumbnail_for_unknown_id_never_renders() {
        let f = fixture();
        let err = f.service.get_thumbnail("bonn").await.unwrap_err();
        assert!(matches!(err, LibraryError::UnknownId(_)));
        assert_eq!(f.renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_thumbnail_failure_is_generation_error() {
        let f = fixture();
        let err = f.service.get_thumbnail("cologne").await.unwrap_err();
        assert!(matches!(err, LibraryError::Generation(_)));
        assert_eq!(f.renderer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_metadata_record() {
        let f = fixture();
        let record = f.service.get_metadata("koeln-rechtsrheinisch").await.unwrap();
        assert_eq!(record.title, "Koeln Rechtsrheinisch");
        assert_eq!(record.publish_date.format("%Y-%m-%d").to_string(), "2025-07-23");
        assert_eq!(record.file_size, 14);
    }

    #[tokio::test]
    async fn test_list_catalog_drops_removed_files() {
        let f = fixture();
        f.service.catalog().get_catalog().await;
        std::fs::remove_file(f.dir.path().join("pdfs/cologne.pdf")).unwrap();

        let entries = f.service.list_catalog().await;
        let ids: Vec<&str> = entries.iter().map(|e| e.record.id.as_str()).collect();
        assert_eq!(ids, vec!["koeln-rechtsrheinisch"]);
    }

    #[tokio::test]
    async fn test_listed_size_falls_back_on_stat_error() {
        let f = fixture();
        let snapshot = f.service.catalog().get_catalog().await;
        let record = snapshot.find("cologne").unwrap();

        // A regular file used as a directory fails with something other than NotFound
        let path = f.dir.path().join("pdfs/cologne.pdf/inner.pdf");
        assert_eq!(listed_size(&path, record).await, Some(record.file_size));

        let gone = f.dir.path().join("pdfs/bonn.pdf");
        assert_eq!(listed_size(&gone, record).await, None);
    }

    #[tokio::test]
    async fn test_thumbnail_follows_id_to_newer_edition() {
        let f = fixture_with(CountingRenderer {
            pages: true,
            ..Default::default()
        });
        let pdf_dir = f.dir.path().join("pdfs");
        let old_edition = pdf_dir.join("23-07-2025-Koeln.pdf");
        std::fs::write(&old_edition, b"%PDF-1.4 23").unwrap();
        set_mtime(&old_edition, SystemTime::now() - StdDuration::from_secs(7200));

        f.service.get_thumbnail("koeln").await.unwrap();
        assert_eq!(f.renderer.calls.load(Ordering::SeqCst), 1);

        // Next day's edition arrives with its original, older mtime preserved
        let new_edition = pdf_dir.join("24-07-2025-Koeln.pdf");
        std::fs::write(&new_edition, b"%PDF-1.4 24").unwrap();
        set_mtime(&new_edition, SystemTime::now() - StdDuration::from_secs(3600));
        f.clock.advance(Duration::seconds(DEFAULT_TTL_SECS));

        let resolved = f.service.catalog().resolve("koeln").await.unwrap();
        assert_eq!(resolved.record.filename, "24-07-2025-Koeln.pdf");

        f.service.get_thumbnail("koeln").await.unwrap();
        assert_eq!(f.renderer.calls.load(Ordering::SeqCst), 2);

        // The older edition is now reachable under its stem id with its own asset
        f.service.get_thumbnail("23-07-2025-koeln").await.unwrap();
        assert_eq!(f.renderer.calls.load(Ordering::SeqCst), 3);
        f.service.get_thumbnail("koeln").await.unwrap();
        assert_eq!(f.renderer.calls.load(Ordering::SeqCst), 3);
    }

    fn set_mtime(path: &Path, to: SystemTime) {
        std::fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(to)
            .unwrap();
    }
}
