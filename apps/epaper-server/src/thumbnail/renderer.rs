//! First-page rasterization
//!
//! The pipeline only needs "give me page 1 of this PDF as an image", so the
//! engine sits behind [`PageRenderer`]. [`MupdfRenderer`] is the production
//! implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::{DynamicImage, RgbImage};
use mupdf::{Colorspace, Document, Matrix};
use thiserror::Error;

/// PDF user space is 72 points per inch
const POINTS_PER_INCH: f32 = 72.0;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to load PDF: {0}")]
    LoadError(String),
    #[error("Document has no pages")]
    NoPages,
    #[error("Image error: {0}")]
    ImageError(String),
    #[error("MuPDF error: {0}")]
    MuPdfError(String),
    #[error("Task join error: {0}")]
    Join(String),
}

impl From<mupdf::Error> for RenderError {
    fn from(e: mupdf::Error) -> Self {
        RenderError::MuPdfError(e.to_string())
    }
}

impl From<image::ImageError> for RenderError {
    fn from(e: image::ImageError) -> Self {
        RenderError::ImageError(e.to_string())
    }
}

/// Renders the first page of a PDF to a raster image
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render_first_page(&self, path: &Path) -> Result<DynamicImage, RenderError>;
}

/// Raster target for first-page previews
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterSpec {
    pub width: u32,
    pub height: u32,
    /// Dots per inch
    pub density: u32,
}

impl Default for RasterSpec {
    fn default() -> Self {
        Self {
            width: 400,
            height: 600,
            density: 100,
        }
    }
}

impl RasterSpec {
    /// Scale factor for a page of `page_width` x `page_height` points.
    ///
    /// Renders at `density`, reduced further if that would overflow the
    /// target box.
    pub fn scale_for(&self, page_width: f32, page_height: f32) -> f32 {
        let density_scale = self.density as f32 / POINTS_PER_INCH;
        if page_width <= 0.0 || page_height <= 0.0 {
            return density_scale;
        }
        let fit_scale = (self.width as f32 / page_width).min(self.height as f32 / page_height);
        density_scale.min(fit_scale)
    }
}

/// MuPDF-backed renderer.
///
/// MuPDF's fz_context is not thread-safe, so every call opens a fresh
/// document on a blocking thread.
#[derive(Debug, Clone, Default)]
pub struct MupdfRenderer {
    spec: RasterSpec,
}

impl MupdfRenderer {
    pub fn new(spec: RasterSpec) -> Self {
        Self { spec }
    }
}

#[async_trait]
impl PageRenderer for MupdfRenderer {
    async fn render_first_page(&self, path: &Path) -> Result<DynamicImage, RenderError> {
        let path: PathBuf = path.to_path_buf();
        let spec = self.spec;

        tokio::task::spawn_blocking(move || render_first_page_blocking(&path, spec))
            .await
            .map_err(|e| RenderError::Join(e.to_string()))?
    }
}

fn render_first_page_blocking(path: &Path, spec: RasterSpec) -> Result<DynamicImage, RenderError> {
    let path_str = path.to_string_lossy();
    let doc = Document::open(&*path_str).map_err(|e| RenderError::LoadError(e.to_string()))?;
    if doc.page_count()? < 1 {
        return Err(RenderError::NoPages);
    }

    let page = doc.load_page(0)?;
    let bounds = page.bounds()?;
    let scale = spec.scale_for(bounds.x1 - bounds.x0, bounds.y1 - bounds.y0);

    let matrix = Matrix::new_scale(scale, scale);
    // Without alpha MuPDF paints the page onto white
    let pixmap = page.to_pixmap(&matrix, &Colorspace::device_rgb(), false, false)?;

    pixmap_to_image(
        pixmap.samples(),
        pixmap.width() as u32,
        pixmap.height() as u32,
        pixmap.n() as usize,
    )
}

/// Copy the colour channels of an RGB(A) sample buffer into an RGB image.
///
/// Rows may be padded, so the row stride is derived from the buffer length.
fn pixmap_to_image(
    samples: &[u8],
    width: u32,
    height: u32,
    components: usize,
) -> Result<DynamicImage, RenderError> {
    let row_len = width as usize * components;
    if row_len == 0 || height == 0 || components < 3 {
        return Err(RenderError::ImageError(format!(
            "Unusable pixmap: {}x{} with {} components",
            width, height, components
        )));
    }
    let stride = samples.len() / height as usize;
    if stride < row_len {
        return Err(RenderError::ImageError(format!(
            "Pixmap buffer too short: {} bytes for {} rows of {}",
            samples.len(),
            height,
            row_len
        )));
    }

    let rgb: Vec<u8> = samples
        .chunks_exact(stride)
        .flat_map(|row| row[..row_len].chunks_exact(components))
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect();

    RgbImage::from_raw(width, height, rgb)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| RenderError::ImageError("Failed to create image buffer".to_string()))
}
