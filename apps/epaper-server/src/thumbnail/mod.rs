//! First-page thumbnails
//!
//! - `renderer`: page rasterization behind the [`PageRenderer`] capability
//! - `normalize`: resize/flatten/re-encode pass
//! - `pipeline`: staleness check, per-id generation, atomic replace

pub mod normalize;
pub mod pipeline;
pub mod renderer;

pub use pipeline::{ThumbnailAsset, ThumbnailPipeline, THUMBNAIL_EXTENSION};
pub use renderer::{MupdfRenderer, PageRenderer, RasterSpec, RenderError};
