//! Sidecar descriptors
//!
//! An edition may ship with `<stem>.json` next to its PDF. The content is
//! opaque to the server and passed through as-is.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::cache::CatalogCache;
use super::document::DocumentRecord;
use super::error::{LibraryError, Result};

/// Opaque sidecar content
pub type EpaperDescriptor = serde_json::Value;

/// Sidecar file extension
pub const DESCRIPTOR_EXTENSION: &str = "json";

/// Loads sidecar descriptors for catalog documents.
///
/// Reads the disk on every call; descriptors are not bound to the catalog
/// TTL.
#[derive(Clone)]
pub struct DescriptorLoader {
    catalog: CatalogCache,
}

impl DescriptorLoader {
    pub fn new(catalog: CatalogCache) -> Self {
        Self { catalog }
    }

    /// Load the descriptor for `id`.
    ///
    /// `Ok(None)` means the document exists but has no sidecar. An unknown id
    /// is [`LibraryError::UnknownId`].
    pub async fn load(&self, id: &str) -> Result<Option<EpaperDescriptor>> {
        let resolved = self.catalog.resolve(id).await?;
        self.load_record(&resolved.record).await
    }

    /// Load the descriptor for a record already taken from a snapshot
    pub async fn load_record(&self, record: &DocumentRecord) -> Result<Option<EpaperDescriptor>> {
        let path = sidecar_path(self.catalog.scanner().pdf_dir(), record);
        read_descriptor(&path).await
    }
}

/// `<pdf_dir>/<stem>.json`
pub fn sidecar_path(pdf_dir: &Path, record: &DocumentRecord) -> PathBuf {
    pdf_dir.join(format!("{}.{}", record.stem(), DESCRIPTOR_EXTENSION))
}

async fn read_descriptor(path: &Path) -> Result<Option<EpaperDescriptor>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(LibraryError::DescriptorLoad {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        }
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| LibraryError::DescriptorLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}
