//! Library module for e-paper editions
//!
//! Handles directory scanning, filename conventions, the catalog cache and
//! sidecar descriptors.

mod cache;
mod descriptor;
mod document;
mod error;
pub mod filename;
mod scanner;

pub use cache::*;
pub use descriptor::*;
pub use document::*;
pub use error::*;
pub use scanner::*;
