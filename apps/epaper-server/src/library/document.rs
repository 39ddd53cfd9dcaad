//! Document types and structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// A PDF document in the watched directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    /// Stable identifier derived from the filename
    pub id: String,

    /// Display title
    pub title: String,

    /// Edition date parsed from the filename (scan time if absent)
    pub publish_date: DateTime<Utc>,

    /// Size in bytes as of the last scan. Callers that report it re-read it
    /// from disk first.
    pub file_size: u64,

    /// Title words longer than two characters
    pub tags: Vec<String>,

    /// Filesystem birth time captured at scan
    pub creation_date: DateTime<Utc>,

    /// Original on-disk name
    pub filename: String,
}

impl DocumentRecord {
    /// Filename without its extension. Sidecar descriptors share this stem.
    pub fn stem(&self) -> &str {
        match self.filename.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.filename,
        }
    }

    /// Copy of the record with a freshly read file size
    pub fn with_file_size(&self, file_size: u64) -> Self {
        Self {
            file_size,
            ..self.clone()
        }
    }
}

/// Immutable view of the catalog at one point in time
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    /// Documents ordered by publish date (newest first), then filename
    pub documents: Vec<DocumentRecord>,

    /// When the scan that produced this snapshot finished. `None` means the
    /// snapshot is a placeholder and must not be served from cache.
    pub built_at: Option<DateTime<Utc>>,
}

impl CatalogSnapshot {
    /// Find a document by id
    pub fn find(&self, id: &str) -> Option<&DocumentRecord> {
        self.documents.iter().find(|doc| doc.id == id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// A catalog id resolved against the snapshot it was found in
#[derive(Debug, Clone)]
pub struct ResolvedDocument {
    pub record: DocumentRecord,
    /// `<pdf_dir>/<filename>`
    pub path: PathBuf,
    /// Snapshot the lookup was answered from
    pub snapshot: Arc<CatalogSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(filename: &str) -> DocumentRecord {
        let ts = Utc.with_ymd_and_hms(2025, 7, 23, 0, 0, 0).unwrap();
        DocumentRecord {
            id: "koeln".to_string(),
            title: "Koeln".to_string(),
            publish_date: ts,
            file_size: 10,
            tags: vec![],
            creation_date: ts,
            filename: filename.to_string(),
        }
    }

    #[test]
    fn test_stem() {
        assert_eq!(record("23-07-2025-Koeln.pdf").stem(), "23-07-2025-Koeln");
        assert_eq!(record("archive.v2.pdf").stem(), "archive.v2");
        assert_eq!(record("noext").stem(), "noext");
    }

    #[test]
    fn test_with_file_size_keeps_identity() {
        let original = record("koeln.pdf");
        let refreshed = original.with_file_size(4096);
        assert_eq!(refreshed.file_size, 4096);
        assert_eq!(refreshed.id, original.id);
        assert_eq!(original.file_size, 10);
    }
}
