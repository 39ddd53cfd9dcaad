//! Application state management

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::library::{CatalogCache, LibraryScanner};
use crate::service::CatalogService;
use crate::thumbnail::{MupdfRenderer, PageRenderer, ThumbnailPipeline};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    service: CatalogService,
}

impl AppState {
    /// Create the production state: wall clock and MuPDF rendering
    pub fn new(config: Config) -> Self {
        let renderer = Arc::new(MupdfRenderer::new(config.thumbnails.raster_spec()));
        Self::with_parts(config, Arc::new(SystemClock), renderer)
    }

    /// Create a state with a specific clock and renderer
    pub fn with_parts(config: Config, clock: Arc<dyn Clock>, renderer: Arc<dyn PageRenderer>) -> Self {
        let catalog = CatalogCache::new(
            LibraryScanner::new(config.library.pdf_dir.clone()),
            clock,
            config.library.catalog_ttl,
        );
        let thumbnails = ThumbnailPipeline::new(
            config.thumbnails.dir.clone(),
            renderer,
            config.thumbnails.raster_spec(),
        );

        Self {
            inner: Arc::new(AppStateInner {
                service: CatalogService::new(catalog, thumbnails),
                config,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the catalog service
    pub fn service(&self) -> &CatalogService {
        &self.inner.service
    }
}
