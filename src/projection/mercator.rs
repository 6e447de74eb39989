use super::{
    horizontal_repeats, rad_to_pixel, Projection, ProjectionKind, RepeatedScreenPosition,
    ScreenPosition,
};
use crate::core::constants::MERCATOR_MAX_LATITUDE;
use crate::core::geo::{normalize_lon, GeoCoordinates, ScreenRect};
use crate::core::viewport::ViewportParams;

/// Inverse Gudermannian: projected Mercator y for a latitude
fn gd_inv(lat: f64) -> f64 {
    lat.sin().atanh()
}

/// Gudermannian: latitude for a projected Mercator y
fn gd(y: f64) -> f64 {
    y.sinh().atan()
}

/// Spherical Mercator, cut off at about ±85.05°
#[derive(Debug, Clone, Copy, Default)]
pub struct MercatorProjection;

impl Projection for MercatorProjection {
    fn kind(&self) -> ProjectionKind {
        ProjectionKind::Mercator
    }

    fn max_lat(&self) -> f64 {
        MERCATOR_MAX_LATITUDE
    }

    fn clipping_radius(&self) -> f64 {
        f64::INFINITY
    }

    fn screen_coordinates(
        &self,
        coordinates: &GeoCoordinates,
        viewport: &ViewportParams,
    ) -> ScreenPosition {
        let center = viewport.center();
        let rad2pixel = rad_to_pixel(viewport);
        let max_lat = self.max_lat();

        // atanh(sin(lat)) diverges at the poles, so the arithmetic only ever
        // sees clamped latitudes
        let lat = coordinates.lat.clamp(-max_lat, max_lat);
        let center_lat = center.lat.clamp(-max_lat, max_lat);

        let x = viewport.width() as f64 / 2.0
            + normalize_lon(coordinates.lon - center.lon) * rad2pixel;
        let y = viewport.height() as f64 / 2.0 - (gd_inv(lat) - gd_inv(center_lat)) * rad2pixel;

        if !x.is_finite() || !y.is_finite() {
            return ScreenPosition::hidden();
        }
        if coordinates.lat.abs() > max_lat {
            return ScreenPosition {
                x,
                y,
                visible: false,
                globe_hides_point: true,
            };
        }
        ScreenPosition::on_canvas(x, y, viewport)
    }

    fn screen_coordinates_repeated(
        &self,
        coordinates: &GeoCoordinates,
        viewport: &ViewportParams,
        footprint: (f64, f64),
    ) -> RepeatedScreenPosition {
        let position = self.screen_coordinates(coordinates, viewport);
        if position.globe_hides_point {
            return RepeatedScreenPosition {
                y: position.y,
                globe_hides_point: true,
                ..Default::default()
            };
        }
        let world_width = 4.0 * viewport.radius() as f64;
        horizontal_repeats(position.x, position.y, world_width, footprint, viewport)
    }

    fn geo_coordinates(
        &self,
        x: f64,
        y: f64,
        viewport: &ViewportParams,
    ) -> Option<GeoCoordinates> {
        let center = viewport.center();
        let rad2pixel = rad_to_pixel(viewport);
        let max_lat = self.max_lat();

        let projected_y = gd_inv(center.lat.clamp(-max_lat, max_lat))
            + (viewport.height() as f64 / 2.0 - y) / rad2pixel;
        let lat = gd(projected_y);
        if !(lat.abs() <= max_lat) {
            return None;
        }

        let lon = normalize_lon(center.lon + (x - viewport.width() as f64 / 2.0) / rad2pixel);
        if !lon.is_finite() {
            return None;
        }
        Some(GeoCoordinates::new(lon, lat))
    }

    fn projected_region(&self, viewport: &ViewportParams) -> ScreenRect {
        let center = viewport.center();
        let rad2pixel = rad_to_pixel(viewport);
        let max_lat = self.max_lat();
        let center_y = gd_inv(center.lat.clamp(-max_lat, max_lat));
        let half_height = viewport.height() as f64 / 2.0;

        let top = half_height - (gd_inv(max_lat) - center_y) * rad2pixel;
        let bottom = half_height + (center_y - gd_inv(-max_lat)) * rad2pixel;
        ScreenRect::new(0.0, top, viewport.width() as f64, bottom - top)
    }

    fn map_covers_viewport(&self, viewport: &ViewportParams) -> bool {
        let region = self.projected_region(viewport);
        region.y <= 0.0 && region.bottom() >= viewport.height() as f64
    }
}
