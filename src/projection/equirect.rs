use super::{
    horizontal_repeats, rad_to_pixel, Projection, ProjectionKind, RepeatedScreenPosition,
    ScreenPosition,
};
use crate::core::geo::{normalize_lon, GeoCoordinates, ScreenRect};
use crate::core::viewport::ViewportParams;
use std::f64::consts::FRAC_PI_2;

/// Plate carrée: longitude and latitude map linearly to x and y
#[derive(Debug, Clone, Copy, Default)]
pub struct EquirectProjection;

impl Projection for EquirectProjection {
    fn kind(&self) -> ProjectionKind {
        ProjectionKind::Equirectangular
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

        let x = viewport.width() as f64 / 2.0
            + normalize_lon(coordinates.lon - center.lon) * rad2pixel;
        let y = viewport.height() as f64 / 2.0 - (coordinates.lat - center.lat) * rad2pixel;

        if !x.is_finite() || !y.is_finite() {
            return ScreenPosition::hidden();
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

        let lat = center.lat + (viewport.height() as f64 / 2.0 - y) / rad2pixel;
        if !(lat.abs() <= FRAC_PI_2) {
            return None;
        }
        let lon = normalize_lon(center.lon + (x - viewport.width() as f64 / 2.0) / rad2pixel);
        Some(GeoCoordinates::new(lon, lat))
    }

    fn projected_region(&self, viewport: &ViewportParams) -> ScreenRect {
        let center = viewport.center();
        let rad2pixel = rad_to_pixel(viewport);
        let half_height = viewport.height() as f64 / 2.0;

        let top = half_height - (FRAC_PI_2 - center.lat) * rad2pixel;
        let bottom = half_height + (FRAC_PI_2 + center.lat) * rad2pixel;
        ScreenRect::new(0.0, top, viewport.width() as f64, bottom - top)
    }

    fn map_covers_viewport(&self, viewport: &ViewportParams) -> bool {
        let region = self.projected_region(viewport);
        region.y <= 0.0 && region.bottom() >= viewport.height() as f64
    }
}
