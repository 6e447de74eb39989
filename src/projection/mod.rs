//! Map projections
//!
//! Every projection is a stateless strategy selected by [`ProjectionKind`].
//! [`projection_for`] hands out process-wide singletons, so a projection can be
//! shared freely between threads and swapped on a [`ViewportParams`] without
//! any lifecycle of its own.

pub mod equirect;
pub mod mercator;
pub mod spherical;
pub mod vertical_perspective;

pub use equirect::EquirectProjection;
pub use mercator::MercatorProjection;
pub use spherical::SphericalProjection;
pub use vertical_perspective::VerticalPerspectiveProjection;

use crate::core::geo::{GeoCoordinates, ScreenRect};
use crate::core::viewport::ViewportParams;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

/// Available projection families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProjectionKind {
    #[default]
    Spherical,
    Equirectangular,
    Mercator,
    VerticalPerspective,
}

static SPHERICAL: SphericalProjection = SphericalProjection;
static EQUIRECT: EquirectProjection = EquirectProjection;
static MERCATOR: MercatorProjection = MercatorProjection;
static VERTICAL_PERSPECTIVE: VerticalPerspectiveProjection = VerticalPerspectiveProjection::new();

/// Shared projection instance for a kind
pub fn projection_for(kind: ProjectionKind) -> &'static dyn Projection {
    match kind {
        ProjectionKind::Spherical => &SPHERICAL,
        ProjectionKind::Equirectangular => &EQUIRECT,
        ProjectionKind::Mercator => &MERCATOR,
        ProjectionKind::VerticalPerspective => &VERTICAL_PERSPECTIVE,
    }
}

/// Result of a forward transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPosition {
    pub x: f64,
    pub y: f64,
    /// The point is on the visible side of the map and lands on the canvas
    pub visible: bool,
    /// The point lies behind the globe or outside the projection's domain.
    /// `x`/`y` are meaningless when this is set.
    pub globe_hides_point: bool,
}

impl ScreenPosition {
    pub(crate) fn hidden() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            visible: false,
            globe_hides_point: true,
        }
    }

    pub(crate) fn on_canvas(x: f64, y: f64, viewport: &ViewportParams) -> Self {
        let visible = x >= 0.0
            && x < viewport.width() as f64
            && y >= 0.0
            && y < viewport.height() as f64;
        Self {
            x,
            y,
            visible,
            globe_hides_point: false,
        }
    }
}

/// Result of the repeated forward transform: one `x` per screen copy of the point
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RepeatedScreenPosition {
    pub xs: Vec<f64>,
    pub y: f64,
    pub globe_hides_point: bool,
}

impl RepeatedScreenPosition {
    /// Number of screen copies the point maps to
    pub fn repeat_count(&self) -> usize {
        self.xs.len()
    }

    pub fn is_visible(&self) -> bool {
        !self.xs.is_empty()
    }
}

/// Coordinate transform between geographic coordinates and screen pixels
pub trait Projection: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> ProjectionKind;

    /// Largest latitude the camera center may take, in radians
    fn max_lat(&self) -> f64 {
        FRAC_PI_2
    }

    fn min_lat(&self) -> f64 {
        -self.max_lat()
    }

    /// Whether the camera may move across the poles
    fn traversable_max_lat(&self) -> bool {
        false
    }

    /// Fraction of the viewport radius beyond which points are never visible
    fn clipping_radius(&self) -> f64 {
        1.0
    }

    /// Forward transform
    fn screen_coordinates(
        &self,
        coordinates: &GeoCoordinates,
        viewport: &ViewportParams,
    ) -> ScreenPosition;

    /// Forward transform listing every copy of the point whose `footprint`
    /// (width, height in pixels, centered on the point) touches the canvas.
    ///
    /// Projections without horizontal wraparound return at most one copy.
    fn screen_coordinates_repeated(
        &self,
        coordinates: &GeoCoordinates,
        viewport: &ViewportParams,
        footprint: (f64, f64),
    ) -> RepeatedScreenPosition {
        let position = self.screen_coordinates(coordinates, viewport);
        if position.globe_hides_point {
            return RepeatedScreenPosition {
                xs: Vec::new(),
                y: position.y,
                globe_hides_point: true,
            };
        }

        let (half_w, half_h) = (footprint.0 / 2.0, footprint.1 / 2.0);
        let on_canvas = position.x + half_w >= 0.0
            && position.x - half_w < viewport.width() as f64
            && position.y + half_h >= 0.0
            && position.y - half_h < viewport.height() as f64;

        RepeatedScreenPosition {
            xs: if on_canvas { vec![position.x] } else { Vec::new() },
            y: position.y,
            globe_hides_point: false,
        }
    }

    /// Inverse transform; `None` when the pixel is outside the projection's domain
    fn geo_coordinates(&self, x: f64, y: f64, viewport: &ViewportParams)
        -> Option<GeoCoordinates>;

    /// Screen rectangle covered by the whole map or globe, before clipping to the canvas
    fn projected_region(&self, viewport: &ViewportParams) -> ScreenRect;

    /// Whether the map fills the entire canvas
    fn map_covers_viewport(&self, viewport: &ViewportParams) -> bool;
}

/// Pixels per radian shared by the flat projections and the perspective scale
pub(crate) fn rad_to_pixel(viewport: &ViewportParams) -> f64 {
    2.0 * viewport.radius() as f64 / std::f64::consts::PI
}

/// Sign convention for grid and label drawing.
///
/// `+1` when north is up, `-1` when north is down and `0` when neither pole
/// can be seen, in which case callers have to cope without a convention.
pub fn polarity(projection: &dyn Projection, viewport: &ViewportParams) -> i32 {
    // For Mercator this probes the cut-off latitudes, which works just as well
    let north = projection.screen_coordinates(
        &GeoCoordinates::new(0.0, projection.max_lat()),
        viewport,
    );
    let south = projection.screen_coordinates(
        &GeoCoordinates::new(0.0, -projection.max_lat()),
        viewport,
    );
    let half_height = viewport.height() as f64 / 2.0;

    let mut polarity = 0;
    if !north.globe_hides_point && !south.globe_hides_point {
        if north.y < south.y {
            polarity = 1;
        }
        if south.y < north.y {
            polarity = -1;
        }
    } else {
        if !north.globe_hides_point && north.y < half_height {
            polarity = 1;
        }
        if !north.globe_hides_point && north.y > half_height {
            polarity = -1;
        }
        if !south.globe_hides_point && south.y > half_height {
            polarity = 1;
        }
        if !south.globe_hides_point && south.y < half_height {
            polarity = -1;
        }
    }
    polarity
}

/// Every on-canvas copy of a point for maps that repeat every `world_width` pixels
pub(crate) fn horizontal_repeats(
    x: f64,
    y: f64,
    world_width: f64,
    footprint: (f64, f64),
    viewport: &ViewportParams,
) -> RepeatedScreenPosition {
    let (half_w, half_h) = (footprint.0 / 2.0, footprint.1 / 2.0);
    let width = viewport.width() as f64;
    let height = viewport.height() as f64;

    let mut xs = Vec::new();
    if y + half_h < 0.0 || y - half_h >= height || world_width <= 0.0 {
        return RepeatedScreenPosition {
            xs,
            y,
            globe_hides_point: false,
        };
    }

    // Walk left to the first copy whose footprint reaches the canvas
    let mut it = x;
    while it - half_w > 0.0 {
        it -= world_width;
    }
    while it + half_w < 0.0 {
        it += world_width;
    }
    while it - half_w < width {
        xs.push(it);
        it += world_width;
    }

    RepeatedScreenPosition {
        xs,
        y,
        globe_hides_point: false,
    }
}
