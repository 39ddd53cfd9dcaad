//! Directory scanner for e-paper editions
//!
//! Lists the watched directory, keeps `*.pdf` files, and turns each into a
//! [`DocumentRecord`] via the filename conventions.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::document::DocumentRecord;
use super::filename;

/// Scanner for a flat directory of PDF editions
#[derive(Debug, Clone)]
pub struct LibraryScanner {
    pdf_dir: PathBuf,
}

impl LibraryScanner {
    /// Create a new scanner for `pdf_dir`
    pub fn new(pdf_dir: impl Into<PathBuf>) -> Self {
        Self {
            pdf_dir: pdf_dir.into(),
        }
    }

    pub fn pdf_dir(&self) -> &Path {
        &self.pdf_dir
    }

    /// Scan the directory and return all documents, ordered and with unique ids.
    ///
    /// Only a failure to list the directory is returned as an error. A file
    /// that vanishes or cannot be stat'ed mid-scan is skipped.
    pub async fn scan_library(&self, scanned_at: DateTime<Utc>) -> std::io::Result<Vec<DocumentRecord>> {
        tracing::info!("Starting library scan of {}", self.pdf_dir.display());
        let start = std::time::Instant::now();

        let mut entries = tokio::fs::read_dir(&self.pdf_dir).await?;
        let mut filenames = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                tracing::debug!("Skipping non UTF-8 filename: {:?}", entry.file_name());
                continue;
            };
            if is_pdf(&name) {
                filenames.push(name);
            }
        }

        let records = join_all(
            filenames
                .into_iter()
                .map(|name| self.process_file(name, scanned_at)),
        )
        .await;

        let mut documents: Vec<DocumentRecord> = records.into_iter().flatten().collect();
        sort_documents(&mut documents);
        assign_unique_ids(&mut documents);

        tracing::info!(
            "Library scan complete: {} documents in {:?}",
            documents.len(),
            start.elapsed()
        );

        Ok(documents)
    }

    /// Stat a single file and derive its record
    async fn process_file(&self, name: String, scanned_at: DateTime<Utc>) -> Option<DocumentRecord> {
        let path = self.pdf_dir.join(&name);
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!("Error reading {}: {}", path.display(), e);
                return None;
            }
        };
        if !metadata.is_file() {
            return None;
        }

        let mut record = filename::parse(&name, scanned_at);
        record.file_size = metadata.len();
        record.creation_date = metadata
            .created()
            .or_else(|_| metadata.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or(scanned_at);

        Some(record)
    }
}

fn is_pdf(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Newest edition first; filename breaks ties
fn sort_documents(documents: &mut [DocumentRecord]) {
    documents.sort_by(|a, b| {
        b.publish_date
            .cmp(&a.publish_date)
            .then_with(|| a.filename.cmp(&b.filename))
    });
}

/// Make ids unique within a snapshot.
///
/// The first holder of an id in snapshot order keeps it, so the plain id
/// names the newest edition. Later holders fall back to the slug of their
/// whole stem, then to numeric suffixes.
fn assign_unique_ids(documents: &mut [DocumentRecord]) {
    let mut used: HashSet<String> = HashSet::with_capacity(documents.len());

    for doc in documents.iter_mut() {
        if used.insert(doc.id.clone()) {
            continue;
        }

        let base = filename::stem_id(&doc.filename);
        let mut candidate = base.clone();
        let mut suffix = 2;
        while used.contains(&candidate) {
            candidate = format!("{}-{}", base, suffix);
            suffix += 1;
        }

        tracing::warn!(
            "Id collision for {}: '{}' already taken, using '{}'",
            doc.filename,
            doc.id,
            candidate
        );
        used.insert(candidate.clone());
        doc.id = candidate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn scan_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_scan_filters_pdfs() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("23-07-2025-Koeln.pdf"), b"%PDF-1.4 a").unwrap();
        std::fs::write(dir.path().join("Bonn.PDF"), b"%PDF-1.4 bb").unwrap();
        std::fs::write(dir.path().join("Koeln.json"), b"{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("nested.pdf")).unwrap();

        let scanner = LibraryScanner::new(dir.path());
        let docs = scanner.scan_library(scan_time()).await.unwrap();

        let names: Vec<&str> = docs.iter().map(|d| d.filename.as_str()).collect();
        // Bonn has no date, so it carries the (later) scan time and sorts first
        assert_eq!(names, vec!["Bonn.PDF", "23-07-2025-Koeln.pdf"]);
        assert_eq!(docs[0].file_size, 11);
        assert_eq!(docs[1].file_size, 10);
    }

    #[tokio::test]
    async fn test_scan_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let scanner = LibraryScanner::new(dir.path().join("missing"));
        assert!(scanner.scan_library(scan_time()).await.is_err());
    }

    #[tokio::test]
    async fn test_collisions_rekey_older_editions() {
        let dir = TempDir::new().unwrap();
        for name in [
            "22-07-2025-Koeln.pdf",
            "23-07-2025-Koeln.pdf",
            "24-07-2025-Koeln.pdf",
        ] {
            std::fs::write(dir.path().join(name), b"%PDF").unwrap();
        }

        let docs = LibraryScanner::new(dir.path())
            .scan_library(scan_time())
            .await
            .unwrap();

        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["koeln", "23-07-2025-koeln", "22-07-2025-koeln"]);
    }

    #[test]
    fn test_numeric_suffix_when_stem_id_taken() {
        let base = filename::parse("a.pdf", scan_time());
        let mut docs = vec![
            DocumentRecord {
                id: "x".into(),
                filename: "x.pdf".into(),
                ..base.clone()
            },
            DocumentRecord {
                id: "x".into(),
                filename: "x.PDF".into(),
                ..base.clone()
            },
            DocumentRecord {
                id: "x".into(),
                filename: "X.pdf".into(),
                ..base
            },
        ];
        assign_unique_ids(&mut docs);
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "x-2", "x-3"]);
    }
}
