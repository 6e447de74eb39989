use crate::core::constants::{DEFAULT_CANVAS_SIZE, DEFAULT_RADIUS};
use crate::core::geo::{normalize_lon, CanvasSize, GeoBounds, GeoCoordinates, ScreenRect};
use crate::core::orientation::Orientation;
use crate::projection::{self, projection_for, Projection, ProjectionKind, ScreenPosition};
use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// Canvas samples per edge used to estimate the visible geographic region
const REGION_SAMPLES: u32 = 16;
/// Samples taken along the rim of a globe's clipping disk
const LIMB_SAMPLES: u32 = 64;

/// Camera state of the globe: projection, orientation, zoom radius and canvas size.
///
/// The active and projected screen regions are cached and recomputed together
/// whenever one of their inputs changes.
#[derive(Debug, Clone)]
pub struct ViewportParams {
    projection_kind: ProjectionKind,
    projection: &'static dyn Projection,
    orientation: Orientation,
    /// Pixels per globe radius
    radius: u32,
    size: CanvasSize,
    bounding_box: GeoBounds,
    /// Screen area covered by the map, clipped to the canvas
    active_region: ScreenRect,
    /// Screen area covered by the map
    projected_region: ScreenRect,
}

impl ViewportParams {
    /// Spherical view of lon 0, lat 0 with the default radius and canvas
    pub fn new() -> Self {
        let kind = ProjectionKind::default();
        let mut viewport = Self {
            projection_kind: kind,
            projection: projection_for(kind),
            orientation: Orientation::identity(),
            radius: DEFAULT_RADIUS,
            size: CanvasSize::new(DEFAULT_CANVAS_SIZE.0, DEFAULT_CANVAS_SIZE.1),
            bounding_box: GeoBounds::world(),
            active_region: ScreenRect::default(),
            projected_region: ScreenRect::default(),
        };
        viewport.set_orientation(Orientation::identity());
        viewport
    }

    pub fn projection(&self) -> ProjectionKind {
        self.projection_kind
    }

    pub fn current_projection(&self) -> &'static dyn Projection {
        self.projection
    }

    /// Swaps the active projection and re-validates the orientation against
    /// its latitude bounds. Returns `false` if the orientation had to be clamped.
    pub fn set_projection(&mut self, kind: ProjectionKind) -> bool {
        self.projection_kind = kind;
        self.projection = projection_for(kind);
        self.refresh_regions();

        // The current axis may be out of range for the new projection
        let orientation = self.orientation;
        self.set_orientation(orientation)
    }

    pub fn orientation(&self) -> &Orientation {
        &self.orientation
    }

    /// Sets the camera orientation.
    ///
    /// For projections that cannot traverse the poles, a center latitude beyond
    /// [`Projection::max_lat`] is clamped to the boundary, keeping longitude and
    /// roll. Returns `false` when such a clamp happened.
    pub fn set_orientation(&mut self, orientation: Orientation) -> bool {
        let mut valid = true;
        let max_lat = self.projection.max_lat();
        let center = orientation.center();

        if !self.projection.traversable_max_lat() && center.lat.abs() > max_lat {
            valid = false;
            let lat = max_lat.copysign(center.lat);
            log::debug!(
                "clamping view center latitude {:.4} to {:.4} for {:?}",
                center.lat,
                lat,
                self.projection_kind
            );
            self.orientation = Orientation::from_center(center.lon, lat, orientation.roll());
        } else {
            self.orientation = orientation;
        }

        self.refresh_regions();
        valid
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    pub fn set_radius(&mut self, radius: u32) {
        self.radius = radius.max(1);
        self.refresh_regions();
    }

    pub fn size(&self) -> CanvasSize {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.size = CanvasSize::new(width, height);
        self.refresh_regions();
    }

    pub fn set_width(&mut self, width: u32) {
        self.size.width = width;
        self.refresh_regions();
    }

    pub fn set_height(&mut self, height: u32) {
        self.size.height = height;
        self.refresh_regions();
    }

    pub fn bounding_box(&self) -> GeoBounds {
        self.bounding_box
    }

    pub fn set_bounding_box(&mut self, bounding_box: GeoBounds) {
        self.bounding_box = bounding_box;
    }

    pub fn active_region(&self) -> ScreenRect {
        self.active_region
    }

    pub fn projected_region(&self) -> ScreenRect {
        self.projected_region
    }

    /// Geographic point under the canvas center
    pub fn center(&self) -> GeoCoordinates {
        let center = self.orientation.center();
        GeoCoordinates::new(normalize_lon(center.lon), center.lat)
    }

    pub fn center_lon(&self) -> f64 {
        self.center().lon
    }

    pub fn center_lat(&self) -> f64 {
        self.center().lat
    }

    /// Whether the globe disk is large enough to cover the whole canvas
    pub fn globe_covers_viewport(&self) -> bool {
        let radius = self.radius as u64;
        let width = self.size.width as u64;
        let height = self.size.height as u64;

        // Quick check for really big radii, which also prevents overflow below
        if radius > width + height {
            return true;
        }
        // Compare against half the diagonal
        4 * radius * radius >= width * width + height * height
    }

    pub fn map_covers_viewport(&self) -> bool {
        self.projection.map_covers_viewport(self)
    }

    /// Sign convention for grid and label drawing, see [`projection::polarity`]
    pub fn polarity(&self) -> i32 {
        projection::polarity(self.projection, self)
    }

    pub fn screen_coordinates(&self, coordinates: &GeoCoordinates) -> ScreenPosition {
        self.projection.screen_coordinates(coordinates, self)
    }

    pub fn geo_coordinates(&self, x: f64, y: f64) -> Option<GeoCoordinates> {
        self.projection.geo_coordinates(x, y, self)
    }

    /// Geographic region shown on the canvas.
    ///
    /// The canvas is sampled on a grid through the inverse projection, and the
    /// rim of a globe's clipping disk wherever it lies on the canvas. A visible
    /// pole extends the region to that pole over all longitudes.
    pub fn view_lat_lon_box(&self) -> GeoBounds {
        let width = self.size.width as f64;
        let height = self.size.height as f64;
        let center = self.center();

        let mut north = f64::NEG_INFINITY;
        let mut south = f64::INFINITY;
        let mut min_dlon = f64::INFINITY;
        let mut max_dlon = f64::NEG_INFINITY;

        for i in 0..=REGION_SAMPLES {
            for j in 0..=REGION_SAMPLES {
                let x = width * i as f64 / REGION_SAMPLES as f64;
                let y = height * j as f64 / REGION_SAMPLES as f64;
                if let Some(geo) = self.geo_coordinates(x, y) {
                    north = north.max(geo.lat);
                    south = south.min(geo.lat);
                    let dlon = normalize_lon(geo.lon - center.lon);
                    min_dlon = min_dlon.min(dlon);
                    max_dlon = max_dlon.max(dlon);
                }
            }
        }

        // A globe smaller than the grid spacing keeps its limb between samples
        let clip = self.projection.clipping_radius();
        if clip.is_finite() {
            let rim = clip * self.radius as f64 * (1.0 - 1e-9);
            for k in 0..LIMB_SAMPLES {
                let theta = TAU * k as f64 / LIMB_SAMPLES as f64;
                let x = width / 2.0 + rim * theta.cos();
                let y = height / 2.0 + rim * theta.sin();
                if !(0.0..=width).contains(&x) || !(0.0..=height).contains(&y) {
                    continue;
                }
                if let Some(geo) = self.geo_coordinates(x, y) {
                    north = north.max(geo.lat);
                    south = south.min(geo.lat);
                    let dlon = normalize_lon(geo.lon - center.lon);
                    min_dlon = min_dlon.min(dlon);
                    max_dlon = max_dlon.max(dlon);
                }
            }
        }

        if !north.is_finite() {
            // Nothing of the map is on the canvas
            return GeoBounds::new(center.lat, center.lat, center.lon, center.lon);
        }

        let mut all_longitudes = false;
        let max_lat = self.projection.max_lat();
        for pole in [max_lat, -max_lat] {
            if self.screen_coordinates(&GeoCoordinates::new(0.0, pole)).visible {
                all_longitudes = true;
                if pole > 0.0 {
                    north = pole.min(FRAC_PI_2);
                } else {
                    south = pole.max(-FRAC_PI_2);
                }
            }
        }

        let world_width = 4.0 * self.radius as f64;
        let wraps = matches!(
            self.projection_kind,
            ProjectionKind::Equirectangular | ProjectionKind::Mercator
        ) && world_width <= width;

        if all_longitudes || wraps || max_dlon - min_dlon >= TAU - 1e-9 {
            return GeoBounds::new(north, south, PI, -PI);
        }

        GeoBounds::new(
            north,
            south,
            normalize_lon(center.lon + max_dlon),
            normalize_lon(center.lon + min_dlon),
        )
    }

    /// Recomputes the active and projected regions; always both, never one alone
    fn refresh_regions(&mut self) {
        let projected = self.projection.projected_region(self);
        let active = projected.intersection(&ScreenRect::from_canvas(self.size));
        self.projected_region = projected;
        self.active_region = active;
    }
}

impl Default for ViewportParams {
    fn default() -> Self {
        Self::new()
    }
}
