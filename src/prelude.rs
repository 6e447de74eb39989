//! Prelude module for common globe-tiles types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use globe_tiles::prelude::*;`

pub use crate::core::{
    config::{CacheProfile, ImageLayer},
    geo::{normalize_lon, CanvasSize, GeoBounds, GeoCoordinates, ScreenRect},
    orientation::Orientation,
    viewport::ViewportParams,
};

pub use crate::projection::{
    projection_for, Projection, ProjectionKind, RepeatedScreenPosition, ScreenPosition,
};

pub use crate::tiles::{
    addressing::{level_to_column, level_to_row, TilePyramid},
    cache::{CacheStats, RecencyCache, TileStore},
    id::TileId,
    loader::{TileLoader, TileLoaderConfig, TileUpdated},
    source::{DownloadScheduler, FetchCompletion, FetchRequest},
    tile::Tile,
};

pub use crate::{Error, Result};

pub use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet, FxHasher};
