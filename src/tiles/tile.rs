use crate::core::constants::BYTES_PER_PIXEL;
use crate::tiles::id::TileId;
use image::RgbaImage;
use std::time::{Duration, SystemTime};

/// One decoded raster tile.
///
/// A tile starts out empty when it is first requested and is filled in place
/// once its raster has been decoded from disk or downloaded. Only tiles with a
/// non-zero [`Tile::byte_size`] may enter the recency cache.
#[derive(Debug, Clone)]
pub struct Tile {
    id: TileId,
    image: Option<RgbaImage>,
    created_at: SystemTime,
    used: bool,
}

impl Tile {
    /// Placeholder for a tile that is still loading
    pub fn empty(id: TileId) -> Self {
        Self {
            id,
            image: None,
            created_at: SystemTime::now(),
            used: false,
        }
    }

    pub fn from_image(id: TileId, image: RgbaImage) -> Self {
        let mut tile = Self::empty(id);
        tile.set_image(image);
        tile
    }

    /// Overrides the creation time, e.g. with the modification time of the tile file
    pub fn with_created_at(mut self, created_at: SystemTime) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn id(&self) -> TileId {
        self.id
    }

    pub fn image(&self) -> Option<&RgbaImage> {
        self.image.as_ref()
    }

    /// Replaces the raster in place and restarts the tile's age
    pub fn set_image(&mut self, image: RgbaImage) {
        self.image = Some(image);
        self.created_at = SystemTime::now();
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn set_created_at(&mut self, created_at: SystemTime) {
        self.created_at = created_at;
    }

    pub fn is_used(&self) -> bool {
        self.used
    }

    pub fn set_used(&mut self, used: bool) {
        self.used = used;
    }

    pub fn width(&self) -> u32 {
        self.image.as_ref().map_or(0, |image| image.width())
    }

    pub fn height(&self) -> u32 {
        self.image.as_ref().map_or(0, |image| image.height())
    }

    /// Size of the decoded raster, the cost unit of the recency cache
    pub fn byte_size(&self) -> usize {
        self.width() as usize * self.height() as usize * BYTES_PER_PIXEL
    }

    pub fn is_valid(&self) -> bool {
        self.byte_size() > 0
    }

    /// Whether the tile is at least `expire` old at `now`.
    /// A creation time in the future never counts as stale.
    pub fn is_expired(&self, now: SystemTime, expire: Duration) -> bool {
        match now.duration_since(self.created_at) {
            Ok(age) => age >= expire,
            Err(_) => false,
        }
    }
}
