//! Error types for the E-Paper server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::library::LibraryError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error("Route not found: {method} {path}")]
    RouteNotFound { method: String, path: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    details: String,
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Library(e) => match e {
                LibraryError::UnknownId(_) => (
                    StatusCode::NOT_FOUND,
                    "PDF_NOT_FOUND",
                    "The requested PDF document was not found".to_string(),
                ),
                LibraryError::MissingFile { .. } => (
                    StatusCode::NOT_FOUND,
                    "FILE_NOT_FOUND",
                    "PDF file not found on server".to_string(),
                ),
                LibraryError::DescriptorNotFound(_) => (
                    StatusCode::NOT_FOUND,
                    "DESCRIPTOR_NOT_FOUND",
                    "The requested PDF document has no descriptor".to_string(),
                ),
                LibraryError::DescriptorLoad { .. } => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DESCRIPTOR_LOAD_ERROR",
                    "Failed to load PDF descriptor".to_string(),
                ),
                LibraryError::Generation(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "THUMBNAIL_GENERATION_ERROR",
                    "Failed to generate PDF thumbnail".to_string(),
                ),
                LibraryError::Io(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                ),
            },
            AppError::RouteNotFound { .. } => (
                StatusCode::NOT_FOUND,
                "ROUTE_NOT_FOUND",
                "API endpoint not found".to_string(),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
        }
    }

    fn details(&self) -> String {
        match self {
            AppError::Library(LibraryError::UnknownId(id)) => {
                format!("No PDF with ID '{}' exists", id)
            }
            AppError::Library(LibraryError::MissingFile { path, .. }) => format!(
                "File does not exist: {}",
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default()
            ),
            AppError::RouteNotFound { method, path } => {
                format!("{} {} is not a valid endpoint", method, path)
            }
            AppError::Library(LibraryError::DescriptorNotFound(id)) => {
                format!("No descriptor for PDF '{}'", id)
            }
            // Server-side details stay in the log outside debug builds
            other if cfg!(debug_assertions) => other.to_string(),
            _ => String::new(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.parts().0
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!("{}", self);
        }

        let body = Json(ErrorResponse {
            error: ErrorBody {
                code,
                message,
                details: self.details(),
            },
        });

        (status, body).into_response()
    }
}
