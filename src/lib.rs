//! # globe-tiles
//!
//! The tile cache and coordinate engine behind a multi-resolution raster globe.
//!
//! Imagery is stored as a pyramid of fixed-size tiles addressed by
//! `(level, column, row)`. The [`tiles`] module keeps the working set of decoded
//! tiles bounded in memory and decides what to read from disk or fetch over the
//! network. The [`projection`] module and [`ViewportParams`] convert between
//! geographic coordinates and screen pixels for several map projections.

pub mod core;
pub mod prelude;
pub mod projection;
pub mod tiles;

pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    config::{CacheProfile, ImageLayer},
    geo::{CanvasSize, GeoBounds, GeoCoordinates, ScreenRect},
    orientation::Orientation,
    viewport::ViewportParams,
};

pub use projection::{
    projection_for, Projection, ProjectionKind, RepeatedScreenPosition, ScreenPosition,
};

pub use tiles::{
    addressing::TilePyramid,
    cache::{CacheStats, RecencyCache, TileStore},
    id::TileId,
    loader::{TileLoader, TileLoaderConfig, TileUpdated},
    source::{DownloadScheduler, FetchCompletion, FetchRequest},
    tile::Tile,
};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decode error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Tile not found on disk: {}", .0.display())]
    TileMissing(std::path::PathBuf),

    #[error("Tile {0} decoded to an empty raster")]
    EmptyRaster(TileId),

    #[error("Invalid tile id token: {0}")]
    InvalidTileId(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Decode worker pool is closed")]
    WorkerPoolClosed,
}
