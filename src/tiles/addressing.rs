//! Geometry of the tile pyramid and its on-disk layout
//!
//! Tiles live at `base_dir/layer_id/level/column/row.ext`. Every level doubles
//! the column and row counts of the previous one, starting from the layer's
//! level-zero counts. Tiles split the globe in equal longitude and latitude
//! steps, row 0 at the north pole.

use crate::core::config::ImageLayer;
use crate::core::constants::MAX_PROBE_LEVEL;
use crate::core::geo::GeoBounds;
use crate::tiles::id::TileId;
use std::f64::consts::{FRAC_PI_2, PI, TAU};
use std::fs;
use std::path::PathBuf;

/// Number of tile columns at `level`
pub fn level_to_column(level_zero_columns: u32, level: u32) -> u32 {
    scale_to_level(level_zero_columns, level)
}

/// Number of tile rows at `level`
pub fn level_to_row(level_zero_rows: u32, level: u32) -> u32 {
    scale_to_level(level_zero_rows, level)
}

fn scale_to_level(level_zero: u32, level: u32) -> u32 {
    if level >= 32 {
        return if level_zero == 0 { 0 } else { u32::MAX };
    }
    ((level_zero as u64) << level).min(u32::MAX as u64) as u32
}

/// Pyramid geometry of one imagery layer
#[derive(Debug, Clone, PartialEq)]
pub struct TilePyramid {
    layer: ImageLayer,
}

impl TilePyramid {
    pub fn new(layer: ImageLayer) -> Self {
        Self { layer }
    }

    pub fn layer(&self) -> &ImageLayer {
        &self.layer
    }

    pub fn columns(&self, level: u32) -> u32 {
        level_to_column(self.layer.level_zero_columns, level)
    }

    pub fn rows(&self, level: u32) -> u32 {
        level_to_row(self.layer.level_zero_rows, level)
    }

    /// Width in pixels of the whole level
    pub fn global_width(&self, level: u32) -> u64 {
        self.columns(level) as u64 * self.layer.tile_width as u64
    }

    /// Height in pixels of the whole level
    pub fn global_height(&self, level: u32) -> u64 {
        self.rows(level) as u64 * self.layer.tile_height as u64
    }

    /// Whether `id` addresses a cell that exists in the pyramid
    pub fn contains(&self, id: &TileId) -> bool {
        id.x < self.columns(id.level) && id.y < self.rows(id.level)
    }

    /// Path of a tile relative to the base directory
    pub fn relative_path(&self, id: &TileId) -> PathBuf {
        let mut path = PathBuf::from(&self.layer.id);
        path.push(id.level.to_string());
        path.push(id.x.to_string());
        path.push(format!("{}.{}", id.y, self.layer.file_extension));
        path
    }

    pub fn local_path(&self, id: &TileId) -> PathBuf {
        self.layer.base_dir.join(self.relative_path(id))
    }

    /// Path of a tile on the download server, always `/` separated
    pub fn remote_path(&self, id: &TileId) -> String {
        format!(
            "{}/{}/{}/{}.{}",
            self.layer.id, id.level, id.x, id.y, self.layer.file_extension
        )
    }

    /// Geographic extent of a tile
    pub fn tile_bounds(&self, id: &TileId) -> GeoBounds {
        let lon_step = TAU / self.columns(id.level) as f64;
        let lat_step = PI / self.rows(id.level) as f64;

        let west = -PI + id.x as f64 * lon_step;
        let north = FRAC_PI_2 - id.y as f64 * lat_step;
        GeoBounds::new(north, north - lat_step, west + lon_step, west)
    }

    /// Every tile at `level` intersecting `bounds`, row by row from the north
    pub fn tiles_covering(&self, bounds: &GeoBounds, level: u32) -> Vec<TileId> {
        let columns = self.columns(level);
        let rows = self.rows(level);
        if columns == 0 || rows == 0 {
            return Vec::new();
        }

        let lat_step = PI / rows as f64;
        let (row_min, row_max) = index_range(
            FRAC_PI_2 - bounds.north.min(FRAC_PI_2),
            FRAC_PI_2 - bounds.south.max(-FRAC_PI_2),
            lat_step,
            rows,
        );

        let lon_step = TAU / columns as f64;
        let column_spans = if bounds.crosses_date_line() {
            let eastward = index_range(bounds.west + PI, TAU, lon_step, columns);
            let westward = index_range(0.0, bounds.east + PI, lon_step, columns);
            // Spans that meet after clamping cover every column exactly once
            if westward.1 + 1 >= eastward.0 {
                vec![(0, columns - 1)]
            } else {
                vec![eastward, westward]
            }
        } else {
            vec![index_range(bounds.west + PI, bounds.east + PI, lon_step, columns)]
        };

        let per_row: usize = column_spans
            .iter()
            .map(|&(first, last)| (last - first + 1) as usize)
            .sum();
        let mut ids = Vec::with_capacity(per_row * (row_max - row_min + 1) as usize);
        for y in row_min..=row_max {
            for &(column_min, column_max) in &column_spans {
                ids.extend((column_min..=column_max).map(|x| TileId::new(level, x, y)));
            }
        }
        ids
    }

    /// Highest level whose tiles are all present on disk, -1 when level 0 is incomplete.
    ///
    /// The scan goes upward from level 0 and stops at the first incomplete
    /// level, so a complete level above a gap is never reported.
    pub fn max_complete_level(&self) -> i32 {
        let mut complete = -1;
        for level in 0..=MAX_PROBE_LEVEL {
            if !self.level_complete(level) {
                break;
            }
            complete = level as i32;
        }

        if complete == -1 {
            log::debug!("no complete tile level found for layer {}", self.layer.id);
        }
        complete
    }

    /// Highest numeric level directory of the layer, -1 when there is none
    pub fn max_partial_level(&self) -> i32 {
        let entries = match fs::read_dir(self.layer.layer_dir()) {
            Ok(entries) => entries,
            Err(e) => {
                log::debug!("cannot list levels of layer {}: {}", self.layer.id, e);
                return -1;
            }
        };

        entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().to_str()?.parse::<i32>().ok())
            .filter(|level| *level >= 0)
            .max()
            .unwrap_or(-1)
    }

    /// Whether every level-zero tile is present on disk
    pub fn base_tiles_available(&self) -> bool {
        self.level_complete(0)
    }

    fn level_complete(&self, level: u32) -> bool {
        (0..self.rows(level)).all(|y| {
            (0..self.columns(level)).all(|x| self.local_path(&TileId::new(level, x, y)).exists())
        })
    }
}

/// Inclusive index range of cells of size `step` overlapping `[start, end]`
fn index_range(start: f64, end: f64, step: f64, count: u32) -> (u32, u32) {
    let last = count.saturating_sub(1) as f64;
    let first = (start / step).floor().clamp(0.0, last);
    // A region ending exactly on a cell edge does not reach into the next cell
    let end_index = ((end / step).ceil() - 1.0).clamp(0.0, last);
    (first as u32, end_index.max(first) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn pyramid() -> TilePyramid {
        TilePyramid::new(ImageLayer::new("earth/bluemarble", "/maps").with_extension("png"))
    }

    #[test]
    fn test_level_math_doubles() {
        assert_eq!(level_to_column(2, 0), 2);
        assert_eq!(level_to_column(2, 3), 16);
        assert_eq!(level_to_row(1, 3), 8);
        assert_eq!(level_to_row(1, 40), u32::MAX);

        let pyramid = pyramid();
        assert_eq!(pyramid.global_width(2), 8 * 256);
        assert_eq!(pyramid.global_height(2), 4 * 256);
    }

    #[test]
    fn test_paths() {
        let pyramid = pyramid();
        let id = TileId::new(3, 7, 2);

        assert_eq!(
            pyramid.relative_path(&id),
            Path::new("earth/bluemarble/3/7/2.png")
        );
        assert_eq!(
            pyramid.local_path(&id),
            Path::new("/maps/earth/bluemarble/3/7/2.png")
        );
        assert_eq!(pyramid.remote_path(&id), "earth/bluemarble/3/7/2.png");
    }

    #[test]
    fn test_tile_bounds() {
        let pyramid = pyramid();
        let bounds = pyramid.tile_bounds(&TileId::new(0, 1, 0));
        assert_eq!(bounds, GeoBounds::new(FRAC_PI_2, -FRAC_PI_2, PI, 0.0));

        let bounds = pyramid.tile_bounds(&TileId::new(1, 0, 1));
        assert!((bounds.north - 0.0).abs() < 1e-12);
        assert!((bounds.west + PI).abs() < 1e-12);
        assert!((bounds.east + FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_tiles_covering() {
        let pyramid = pyramid();

        let all = pyramid.tiles_covering(&GeoBounds::world(), 1);
        assert_eq!(all.len(), 8);

        // A small region just north-east of lon 0, lat 0
        let small = GeoBounds::from_degrees(10.0, 5.0, 10.0, 5.0);
        assert_eq!(pyramid.tiles_covering(&small, 1), vec![TileId::new(1, 2, 0)]);

        // Across the antimeridian: the last and the first column
        let seam = GeoBounds::from_degrees(10.0, 5.0, -170.0, 170.0);
        assert_eq!(
            pyramid.tiles_covering(&seam, 1),
            vec![TileId::new(1, 3, 0), TileId::new(1, 0, 0)]
        );
    }

    #[test]
    fn test_tiles_covering_has_no_duplicates() {
        let pyramid = pyramid();

        let world = pyramid.tiles_covering(&GeoBounds::world(), 6);
        assert_eq!(world.len(), 8192);
        let unique: std::collections::BTreeSet<_> = world.iter().collect();
        assert_eq!(unique.len(), world.len());

        // Nearly the whole world the long way round: both halves meet in the middle
        let wide = GeoBounds::from_degrees(10.0, 5.0, -1.0, 1.0);
        let ids = pyramid.tiles_covering(&wide, 1);
        assert_eq!(
            ids,
            (0..4).map(|x| TileId::new(1, x, 0)).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_probing_missing_directory() {
        let pyramid = TilePyramid::new(ImageLayer::new("nothing/here", "/nonexistent/globe-tiles"));
        assert_eq!(pyramid.max_complete_level(), -1);
        assert_eq!(pyramid.max_partial_level(), -1);
        assert!(!pyramid.base_tiles_available());
    }
}
