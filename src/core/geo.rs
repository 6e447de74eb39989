use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// Wraps a longitude in radians into the `(-PI, PI]` range
pub fn normalize_lon(lon: f64) -> f64 {
    let wrapped = lon % TAU;
    if wrapped > PI {
        wrapped - TAU
    } else if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Clamps a latitude in radians into `[-PI/2, PI/2]`
pub fn clamp_lat(lat: f64) -> f64 {
    lat.clamp(-FRAC_PI_2, FRAC_PI_2)
}

/// A geographic position on the unit sphere. Both angles are in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinates {
    pub lon: f64,
    pub lat: f64,
}

impl GeoCoordinates {
    /// Creates a new coordinate from radians
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Creates a new coordinate from degrees
    pub fn from_degrees(lon: f64, lat: f64) -> Self {
        Self::new(lon.to_radians(), lat.to_radians())
    }

    pub fn lon_degrees(&self) -> f64 {
        self.lon.to_degrees()
    }

    pub fn lat_degrees(&self) -> f64 {
        self.lat.to_degrees()
    }

    /// Returns the coordinate with longitude in `(-PI, PI]` and latitude clamped to the poles
    pub fn normalized(&self) -> Self {
        Self::new(normalize_lon(self.lon), clamp_lat(self.lat))
    }

    /// Position on the unit sphere.
    ///
    /// `(0, 0)` maps to `+z`, the north pole to `+y` and `lon = PI/2` to `+x`.
    pub fn to_unit_vector(&self) -> Vector3<f64> {
        let (sin_lat, cos_lat) = self.lat.sin_cos();
        let (sin_lon, cos_lon) = self.lon.sin_cos();
        Vector3::new(cos_lat * sin_lon, sin_lat, cos_lat * cos_lon)
    }

    /// Inverse of [`GeoCoordinates::to_unit_vector`]; the vector does not need to be normalized
    pub fn from_unit_vector(v: &Vector3<f64>) -> Self {
        let norm = v.norm();
        if norm == 0.0 {
            return Self::default();
        }
        let lat = (v.y / norm).clamp(-1.0, 1.0).asin();
        let lon = v.x.atan2(v.z);
        Self::new(lon, lat)
    }

    /// Great-circle angle to another coordinate, in radians
    pub fn angular_distance_to(&self, other: &GeoCoordinates) -> f64 {
        let delta_lat = other.lat - self.lat;
        let delta_lon = other.lon - self.lon;

        let a = (delta_lat / 2.0).sin().powi(2)
            + self.lat.cos() * other.lat.cos() * (delta_lon / 2.0).sin().powi(2);
        2.0 * a.sqrt().atan2((1.0 - a).sqrt())
    }
}

impl Default for GeoCoordinates {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Size of the drawing canvas in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle in screen pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ScreenRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle covering a whole canvas
    pub fn from_canvas(size: CanvasSize) -> Self {
        Self::new(0.0, 0.0, size.width as f64, size.height as f64)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Overlap of two rectangles; empty (zero sized) when they do not intersect
    pub fn intersection(&self, other: &ScreenRect) -> ScreenRect {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right <= left || bottom <= top {
            return ScreenRect::new(left, top, 0.0, 0.0);
        }
        ScreenRect::new(left, top, right - left, bottom - top)
    }
}

/// Geographic bounding region, in radians.
///
/// `west > east` means the region crosses the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl GeoBounds {
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self {
            north,
            south,
            east,
            west,
        }
    }

    /// The whole globe
    pub fn world() -> Self {
        Self::new(FRAC_PI_2, -FRAC_PI_2, PI, -PI)
    }

    /// Creates bounds from degrees
    pub fn from_degrees(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self::new(
            north.to_radians(),
            south.to_radians(),
            east.to_radians(),
            west.to_radians(),
        )
    }

    pub fn crosses_date_line(&self) -> bool {
        self.west > self.east
    }

    /// Longitude extent in radians, accounting for antimeridian crossing
    pub fn width(&self) -> f64 {
        if self.crosses_date_line() {
            self.east + TAU - self.west
        } else {
            self.east - self.west
        }
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    pub fn contains(&self, point: &GeoCoordinates) -> bool {
        if point.lat > self.north || point.lat < self.south {
            return false;
        }
        let lon = normalize_lon(point.lon);
        if self.crosses_date_line() {
            lon >= self.west || lon <= self.east
        } else {
            lon >= self.west && lon <= self.east
        }
    }

    pub fn center(&self) -> GeoCoordinates {
        GeoCoordinates::new(
            normalize_lon(self.west + self.width() / 2.0),
            (self.north + self.south) / 2.0,
        )
    }
}

impl Default for GeoBounds {
    fn default() -> Self {
        Self::world()
    }
}
