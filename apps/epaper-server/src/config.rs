//! Configuration management for the E-Paper server

use chrono::Duration;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::library::DEFAULT_TTL_SECS;
use crate::thumbnail::RasterSpec;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub library: LibraryConfig,
    pub thumbnails: ThumbnailConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Base for `downloadUrl`/`thumbnailUrl` in listings
    pub public_base_url: String,
}

#[derive(Debug, Clone)]
pub struct LibraryConfig {
    pub pdf_dir: PathBuf,
    /// How long a catalog snapshot is served before rescanning
    pub catalog_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct ThumbnailConfig {
    pub dir: PathBuf,
    pub width: u32,
    pub height: u32,
    pub density: u32,
}

impl ThumbnailConfig {
    pub fn raster_spec(&self) -> RasterSpec {
        RasterSpec {
            width: self.width,
            height: self.height,
            density: self.density,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let raster = RasterSpec::default();
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                public_base_url: "http://localhost:3000".to_string(),
            },
            library: LibraryConfig {
                pdf_dir: PathBuf::from("./pdfs"),
                catalog_ttl: Duration::seconds(DEFAULT_TTL_SECS),
            },
            thumbnails: ThumbnailConfig {
                dir: PathBuf::from("./thumbnails"),
                width: raster.width,
                height: raster.height,
                density: raster.density,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source; unset variables keep their
    /// defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();
        let port = parse_or(&lookup, "SERVER_PORT", defaults.server.port)?;

        Ok(Config {
            server: ServerConfig {
                host: lookup("SERVER_HOST").unwrap_or(defaults.server.host),
                port,
                public_base_url: lookup("PUBLIC_BASE_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| format!("http://localhost:{}", port)),
            },
            library: LibraryConfig {
                pdf_dir: lookup("PDF_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.library.pdf_dir),
                catalog_ttl: parse_ttl(&lookup, "CATALOG_TTL_SECS", defaults.library.catalog_ttl)?,
            },
            thumbnails: ThumbnailConfig {
                dir: lookup("THUMBNAIL_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.thumbnails.dir),
                width: parse_positive(&lookup, "THUMBNAIL_WIDTH", defaults.thumbnails.width)?,
                height: parse_positive(&lookup, "THUMBNAIL_HEIGHT", defaults.thumbnails.height)?,
                density: parse_positive(&lookup, "THUMBNAIL_DENSITY", defaults.thumbnails.density)?,
            },
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(default),
    }
}

/// Non-zero pixel or density value
fn parse_positive(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: u32,
) -> Result<u32, ConfigError> {
    match parse_or(lookup, name, default)? {
        0 => Err(ConfigError::InvalidValue {
            name,
            value: "0".to_string(),
        }),
        value => Ok(value),
    }
}

/// Whole seconds that fit a `chrono::Duration`
fn parse_ttl(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let Some(value) = lookup(name) else {
        return Ok(default);
    };
    value
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(Duration::try_seconds)
        .ok_or(ConfigError::InvalidValue { name, value })
}
