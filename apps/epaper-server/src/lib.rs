//! E-Paper Server Library
//!
//! Serves a directory of dated newspaper PDFs as a JSON catalog with
//! downloads, sidecar descriptors and first-page thumbnails.
//! The server binary is in main.rs.
//!
//! # Modules
//!
//! - `library`: Filename parsing, directory scanning and the catalog cache
//! - `thumbnail`: First-page rendering and the on-disk thumbnail cache
//! - `service`: Catalog operations used by the HTTP layer
//! - `routes`: Axum routers

pub mod clock;
pub mod config;
pub mod error;
pub mod library;
pub mod routes;
pub mod service;
pub mod state;
pub mod thumbnail;
