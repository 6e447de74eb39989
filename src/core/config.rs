//! Configuration consumed by the tile pipeline
//!
//! An [`ImageLayer`] describes one imagery layer of the current theme: where its
//! pyramid lives on disk, how the pyramid is shaped and how long tiles stay
//! fresh. It is read-only to this crate. [`CacheProfile`] offers presets for the
//! memory side of the loader.

use crate::core::constants::{DEFAULT_EXPIRE_SECONDS, DEFAULT_TILE_SIZE};
use crate::tiles::loader::TileLoaderConfig;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum CacheProfile {
    #[default]
    Balanced,
    LowMemory,
    HighMemory,
    Custom(TileLoaderConfig),
}

impl CacheProfile {
    pub fn resolve(&self) -> TileLoaderConfig {
        match self {
            Self::Balanced => TileLoaderConfig::default(),
            Self::LowMemory => TileLoaderConfig::low_resource(),
            Self::HighMemory => TileLoaderConfig::high_performance(),
            Self::Custom(config) => config.clone(),
        }
    }
}

/// Descriptor of a tiled imagery layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageLayer {
    /// Layer identifier, also the first directory of every tile path (e.g. `earth/bluemarble`)
    pub id: String,
    /// Directory the layer directory lives in
    pub base_dir: PathBuf,
    #[serde(default = "default_extension")]
    pub file_extension: String,
    #[serde(default = "default_level_zero_columns")]
    pub level_zero_columns: u32,
    #[serde(default = "default_level_zero_rows")]
    pub level_zero_rows: u32,
    #[serde(default = "default_expire_seconds")]
    pub expire_seconds: u64,
    #[serde(default = "default_tile_size")]
    pub tile_width: u32,
    #[serde(default = "default_tile_size")]
    pub tile_height: u32,
}

fn default_extension() -> String {
    "jpg".to_string()
}

fn default_level_zero_columns() -> u32 {
    2
}

fn default_level_zero_rows() -> u32 {
    1
}

fn default_expire_seconds() -> u64 {
    DEFAULT_EXPIRE_SECONDS
}

fn default_tile_size() -> u32 {
    DEFAULT_TILE_SIZE
}

impl ImageLayer {
    /// Creates a layer with the usual two-by-one level zero
    pub fn new(id: impl Into<String>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            base_dir: base_dir.into(),
            file_extension: default_extension(),
            level_zero_columns: default_level_zero_columns(),
            level_zero_rows: default_level_zero_rows(),
            expire_seconds: default_expire_seconds(),
            tile_width: default_tile_size(),
            tile_height: default_tile_size(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.file_extension = extension.into();
        self
    }

    pub fn with_level_zero(mut self, columns: u32, rows: u32) -> Self {
        self.level_zero_columns = columns;
        self.level_zero_rows = rows;
        self
    }

    pub fn with_expire_seconds(mut self, seconds: u64) -> Self {
        self.expire_seconds = seconds;
        self
    }

    pub fn with_tile_size(mut self, width: u32, height: u32) -> Self {
        self.tile_width = width;
        self.tile_height = height;
        self
    }

    /// Parses and validates a JSON layer descriptor
    pub fn from_json(json: &str) -> Result<Self> {
        let layer: ImageLayer = serde_json::from_str(json)?;
        layer.validate()?;
        Ok(layer)
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::Config("layer id must not be empty".into()));
        }
        if self.file_extension.trim().is_empty() {
            return Err(Error::Config(format!(
                "layer {} has no tile file extension",
                self.id
            )));
        }
        if self.level_zero_columns == 0 || self.level_zero_rows == 0 {
            return Err(Error::Config(format!(
                "layer {} needs at least one level-zero column and row",
                self.id
            )));
        }
        if self.tile_width == 0 || self.tile_height == 0 {
            return Err(Error::Config(format!(
                "layer {} has a zero tile dimension",
                self.id
            )));
        }
        Ok(())
    }

    pub fn expire(&self) -> Duration {
        Duration::from_secs(self.expire_seconds)
    }

    /// Directory holding all levels of this layer
    pub fn layer_dir(&self) -> PathBuf {
        self.base_dir.join(Path::new(&self.id))
    }
}
