use crate::core::geo::GeoCoordinates;
use nalgebra::{UnitQuaternion, Vector3};

/// Camera orientation of the globe, stored as a unit quaternion that rotates
/// world vectors into the camera frame.
///
/// In the camera frame `+x` points right, `+y` up and `+z` towards the viewer,
/// so the geographic point on the `+z` axis is the view center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    rotation: UnitQuaternion<f64>,
}

impl Orientation {
    /// Looking at lon 0, lat 0 with no roll
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
        }
    }

    pub fn from_quaternion(rotation: UnitQuaternion<f64>) -> Self {
        Self { rotation }
    }

    /// Builds the orientation that centers the view on `(lon, lat)` and then
    /// rolls the view by `roll` around the viewing axis. All angles in radians.
    pub fn from_center(lon: f64, lat: f64, roll: f64) -> Self {
        let yaw = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), -lon);
        let pitch = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), lat);
        let roll = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), roll);
        Self {
            rotation: roll * pitch * yaw,
        }
    }

    pub fn quaternion(&self) -> &UnitQuaternion<f64> {
        &self.rotation
    }

    /// Geographic point under the view center
    pub fn center(&self) -> GeoCoordinates {
        let axis = self.rotation.inverse() * Vector3::z();
        GeoCoordinates::from_unit_vector(&axis)
    }

    /// Rotation around the viewing axis left over once the center is applied
    pub fn roll(&self) -> f64 {
        let center = self.center();
        let base = Self::from_center(center.lon, center.lat, 0.0);
        (self.rotation * base.rotation.inverse()).scaled_axis().z
    }

    /// World vector expressed in the camera frame
    pub fn to_view(&self, world: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * world
    }

    /// Camera-frame vector expressed in world coordinates
    pub fn to_world(&self, view: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.inverse() * view
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Self::identity()
    }
}
