//! PDF catalog endpoints
//!
//! - `GET /api/pdfs` list editions
//! - `GET /api/pdfs/:id/download` stream the PDF
//! - `GET /api/pdfs/:id/metadata` document metadata
//! - `GET /api/pdfs/:id/descriptor` sidecar descriptor
//! - `GET /api/pdfs/:id/thumbnail` first-page PNG

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::ErrorKind;

use crate::error::{AppError, Result};
use crate::library::{EpaperDescriptor, LibraryError};
use crate::service::CatalogEntry;
use crate::state::AppState;

const PDF_CACHE_CONTROL: &str = "public, max-age=86400"; // 24 hours
const THUMBNAIL_CACHE_CONTROL: &str = "public, max-age=604800"; // 7 days

const AUTHOR: &str = "E-Paper System";
const PRODUCER: &str = "E-Paper Publishing System";

/// Catalog entry as listed to clients
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfListItem {
    #[serde(flatten)]
    pub entry: CatalogEntry,
    pub download_url: String,
    pub thumbnail_url: String,
}

/// Metadata view of a single document
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfMetadataResponse {
    pub id: String,
    pub title: String,
    pub author: &'static str,
    pub creation_date: DateTime<Utc>,
    pub publish_date: DateTime<Utc>,
    pub file_size: u64,
    pub keywords: Vec<String>,
    pub subject: String,
    pub producer: &'static str,
    pub creator: &'static str,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/pdfs", get(list_pdfs))
        .route("/api/pdfs/:id/download", get(download_pdf))
        .route("/api/pdfs/:id/metadata", get(pdf_metadata))
        .route("/api/pdfs/:id/descriptor", get(pdf_descriptor))
        .route("/api/pdfs/:id/thumbnail", get(pdf_thumbnail))
}

async fn list_pdfs(State(state): State<AppState>) -> Json<Vec<PdfListItem>> {
    let base = &state.config().server.public_base_url;
    let entries = state.service().list_catalog().await;
    tracing::debug!("Returning {} PDFs", entries.len());

    let items = entries
        .into_iter()
        .map(|entry| {
            let id = urlencoding::encode(&entry.record.id).into_owned();
            PdfListItem {
                download_url: format!("{}/api/pdfs/{}/download", base, id),
                thumbnail_url: format!("{}/api/pdfs/{}/thumbnail", base, id),
                entry,
            }
        })
        .collect();

    Json(items)
}

async fn download_pdf(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let file = state.service().resolve_and_stream(&id).await?;

    let bytes = match tokio::fs::read(&file.path).await {
        Ok(bytes) => bytes,
        // Removed between the stat and the read
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(LibraryError::MissingFile {
                id,
                path: file.path,
            }
            .into())
        }
        Err(e) => return Err(LibraryError::Io(e).into()),
    };

    tracing::info!("Serving PDF: {} ({} bytes)", file.filename, bytes.len());

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(header::CONTENT_LENGTH, bytes.len())
        .header(header::CONTENT_DISPOSITION, content_disposition(&file.filename))
        .header(header::CACHE_CONTROL, PDF_CACHE_CONTROL)
        .body(Body::from(bytes))
        .map_err(|e| AppError::Internal(e.to_string()))
}

async fn pdf_metadata(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PdfMetadataResponse>> {
    let record = state.service().get_metadata(&id).await?;

    Ok(Json(PdfMetadataResponse {
        subject: format!("E-Paper vom {}", record.publish_date.format("%d.%m.%Y")),
        id: record.id,
        title: record.title,
        author: AUTHOR,
        creation_date: record.creation_date,
        publish_date: record.publish_date,
        file_size: record.file_size,
        keywords: record.tags,
        producer: PRODUCER,
        creator: AUTHOR,
    }))
}

async fn pdf_descriptor(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EpaperDescriptor>> {
    Ok(Json(state.service().get_descriptor(&id).await?))
}

async fn pdf_thumbnail(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response> {
    let asset = state.service().get_thumbnail(&id).await?;
    let etag = format!("\"{}-{}\"", id, asset.last_modified.timestamp_millis());
    let last_modified = asset
        .last_modified
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string();

    let not_modified = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.split(',').any(|tag| tag.trim() == etag));

    let builder = Response::builder()
        .header(header::ETAG, &etag)
        .header(header::LAST_MODIFIED, last_modified)
        .header(header::CACHE_CONTROL, THUMBNAIL_CACHE_CONTROL);

    if not_modified {
        return builder
            .status(StatusCode::NOT_MODIFIED)
            .body(Body::empty())
            .map_err(|e| AppError::Internal(e.to_string()));
    }

    let bytes = tokio::fs::read(&asset.path)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to read thumbnail: {}", e)))?;

    tracing::debug!("Serving thumbnail for {} ({} bytes)", id, bytes.len());

    builder
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/png")
        .header(header::CONTENT_LENGTH, bytes.len())
        .body(Body::from(bytes))
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// `inline` disposition with an ASCII fallback and an RFC 5987 encoded name
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "inline; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition() {
        assert_eq!(
            content_disposition("23-07-2025-Köln.pdf"),
            "inline; filename=\"23-07-2025-K_ln.pdf\"; filename*=UTF-8''23-07-2025-K%C3%B6ln.pdf"
        );
        assert_eq!(
            content_disposition("a\"b.pdf"),
            "inline; filename=\"a_b.pdf\"; filename*=UTF-8''a%22b.pdf"
        );
    }
}
