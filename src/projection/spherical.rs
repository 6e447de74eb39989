use super::{Projection, ProjectionKind, ScreenPosition};
use crate::core::geo::{normalize_lon, GeoCoordinates, ScreenRect};
use crate::core::viewport::ViewportParams;
use nalgebra::Vector3;

/// Orthographic view of the globe driven directly by the camera quaternion
#[derive(Debug, Clone, Copy, Default)]
pub struct SphericalProjection;

impl Projection for SphericalProjection {
    fn kind(&self) -> ProjectionKind {
        ProjectionKind::Spherical
    }

    fn traversable_max_lat(&self) -> bool {
        true
    }

    fn screen_coordinates(
        &self,
        coordinates: &GeoCoordinates,
        viewport: &ViewportParams,
    ) -> ScreenPosition {
        let view = viewport
            .orientation()
            .to_view(&coordinates.to_unit_vector());
        let radius = viewport.radius() as f64;

        let x = viewport.width() as f64 / 2.0 + radius * view.x;
        let y = viewport.height() as f64 / 2.0 - radius * view.y;

        // Behind the globe; also rejects NaN
        if !(view.z >= 0.0) {
            return ScreenPosition {
                x,
                y,
                visible: false,
                globe_hides_point: true,
            };
        }
        ScreenPosition::on_canvas(x, y, viewport)
    }

    fn geo_coordinates(
        &self,
        x: f64,
        y: f64,
        viewport: &ViewportParams,
    ) -> Option<GeoCoordinates> {
        let radius = viewport.radius() as f64;
        let rx = (x - viewport.width() as f64 / 2.0) / radius;
        let ry = (viewport.height() as f64 / 2.0 - y) / radius;

        let r2 = rx * rx + ry * ry;
        if !(r2 <= 1.0) {
            return None;
        }

        let view = Vector3::new(rx, ry, (1.0 - r2).sqrt());
        let world = viewport.orientation().to_world(&view);
        let geo = GeoCoordinates::from_unit_vector(&world);
        Some(GeoCoordinates::new(normalize_lon(geo.lon), geo.lat))
    }

    fn projected_region(&self, viewport: &ViewportParams) -> ScreenRect {
        let radius = viewport.radius() as f64;
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
