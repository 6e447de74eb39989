use super::{Projection, ProjectionKind, ScreenPosition};
use crate::core::constants::PERSPECTIVE_DISTANCE;
use crate::core::geo::{normalize_lon, GeoCoordinates, ScreenRect};
use crate::core::viewport::ViewportParams;
use std::f64::consts::PI;

/// Smallest angular distance from the center used by the inverse transform
const MIN_RHO: f64 = 0.0001;

/// View of the globe from a finite distance above the view center.
///
/// `distance` is measured from the globe center in globe radii, so only the
/// cap where `cos(c) >= 1 / distance` faces the camera.
#[derive(Debug, Clone, Copy)]
pub struct VerticalPerspectiveProjection {
    distance: f64,
}

impl VerticalPerspectiveProjection {
    pub const fn new() -> Self {
        Self {
            distance: PERSPECTIVE_DISTANCE,
        }
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// Pixels per unit of the projected plane
    fn scale(viewport: &ViewportParams) -> f64 {
        4.0 * viewport.radius() as f64 / PI
    }
}

impl Default for VerticalPerspectiveProjection {
    fn default() -> Self {
        Self::new()
    }
}

impl Projection for VerticalPerspectiveProjection {
    fn kind(&self) -> ProjectionKind {
        ProjectionKind::VerticalPerspective
    }

    fn traversable_max_lat(&self) -> bool {
        true
    }

    fn screen_coordinates(
        &self,
        coordinates: &GeoCoordinates,
        viewport: &ViewportParams,
    ) -> ScreenPosition {
        let p = self.distance;
        let center = viewport.center();
        let (sin_phi, cos_phi) = coordinates.lat.sin_cos();
        let (sin_phi1, cos_phi1) = center.lat.sin_cos();
        let (sin_dlon, cos_dlon) = (coordinates.lon - center.lon).sin_cos();

        let cos_c = sin_phi1 * sin_phi + cos_phi1 * cos_phi * cos_dlon;

        // Behind the horizon; also rejects NaN
        if !(cos_c >= 1.0 / p) {
            return ScreenPosition::hidden();
        }

        let k = (p - 1.0) / (p - cos_c);
        let scale = Self::scale(viewport);
        let px = cos_phi * sin_dlon * k * scale;
        let py = (cos_phi1 * sin_phi - sin_phi1 * cos_phi * cos_dlon) * k * scale;

        let clip = self.clipping_radius() * viewport.radius() as f64;
        if !(px * px + py * py <= clip * clip) {
            return ScreenPosition::hidden();
        }

        let x = viewport.width() as f64 / 2.0 + px;
        let y = viewport.height() as f64 / 2.0 - py;
        ScreenPosition::on_canvas(x, y, viewport)
    }

    fn geo_coordinates(
        &self,
        x: f64,
        y: f64,
        viewport: &ViewportParams,
    ) -> Option<GeoCoordinates> {
        let p = self.distance;
        let center = viewport.center();
        let scale = Self::scale(viewport);

        let dx = x - viewport.width() as f64 / 2.0;
        let dy = viewport.height() as f64 / 2.0 - y;
        let clip = self.clipping_radius() * viewport.radius() as f64;
        if !(dx * dx + dy * dy <= clip * clip) {
            return None;
        }

        let rx = dx / scale;
        let ry = dy / scale;
        let rho = (rx * rx + ry * ry).sqrt().max(MIN_RHO);

        let discriminant = 1.0 - rho * rho * (p + 1.0) / (p - 1.0);
        if !(discriminant >= 0.0) {
            return None;
        }

        let denominator = (p - 1.0) / rho + rho / (p - 1.0);
        let c = ((p - discriminant.sqrt()) / denominator)
            .clamp(-1.0, 1.0)
            .asin();
        let (sin_c, cos_c) = c.sin_cos();
        let (sin_phi1, cos_phi1) = center.lat.sin_cos();

        let lon = center.lon
            + (rx * sin_c).atan2(rho * cos_phi1 * cos_c - ry * sin_phi1 * sin_c);
        let lat = (cos_c * sin_phi1 + ry * sin_c * cos_phi1 / rho)
            .clamp(-1.0, 1.0)
            .asin();

        if lon.is_nan() || lat.is_nan() {
            log::trace!("vertical perspective inverse unresolved at ({}, {})", x, y);
            return None;
        }
        Some(GeoCoordinates::new(normalize_lon(lon), lat))
    }

    fn projected_region(&self, viewport: &ViewportParams) -> ScreenRect {
        // The horizon lies just outside the clipping disk, so the disk bounds the globe
        let radius = self.clipping_radius() * viewport.radius() as f64;
        ScreenRect::new(
            viewport.width() as f64 / 2.0 - radius,
            viewport.height() as f64 / 2.0 - radius,
            2.0 * radius,
            2.0 * radius,
        )
    }

    fn map_covers_viewport(&self, viewport: &ViewportParams) -> bool {
        viewport.globe_covers_viewport()
    }
}
