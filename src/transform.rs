//! Composition of the world-to-camera rotation
//!
//! `world_to_camera = device_to_world · conjugate(device · screen)`
//!
//! - `device` is the fused Z-X-Y orientation quaternion
//! - `screen` rotates about the viewing axis (device Z) by minus the UI angle
//! - `device_to_world` is a fixed +90° turn about X taking the device's
//!   screen-plane frame to the Y-up world frame
//!
//! The device/screen product is inverted because the renderer moves world
//! geometry into camera space, the opposite of the device's own rotation.

use nalgebra::{Matrix3, Matrix4, Quaternion, UnitQuaternion, Vector3};

use crate::fusion::OrientationState;
use crate::math::{quaternion_to_homogeneous, quaternion_to_rotation_matrix};
use crate::types::ScreenOrientation;

/// Rotation that orients world-space geometry relative to the physical device
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    rotation: UnitQuaternion<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            rotation: device_to_world(),
        }
    }
}

impl Transform {
    pub fn quaternion(&self) -> UnitQuaternion<f32> {
        self.rotation
    }

    /// 3x3 rotation matrix, built with the norm-corrected conversion
    pub fn matrix3(&self) -> Matrix3<f32> {
        quaternion_to_rotation_matrix(self.rotation.as_ref())
    }

    /// Homogeneous 4x4 matrix for renderers that take model-view matrices
    pub fn matrix4(&self) -> Matrix4<f32> {
        quaternion_to_homogeneous(self.rotation.as_ref())
    }

    /// Rotate a world-space point into camera space
    pub fn transform_point(&self, point: &Vector3<f32>) -> Vector3<f32> {
        self.rotation * point
    }
}

/// Fixed +90° rotation about X from the device frame to the Y-up world frame
pub fn device_to_world() -> UnitQuaternion<f32> {
    UnitQuaternion::from_axis_angle(&Vector3::x_axis(), core::f32::consts::FRAC_PI_2)
}

/// Screen correction: rotation about the viewing axis by minus the screen angle
pub fn screen_quaternion(screen: ScreenOrientation) -> UnitQuaternion<f32> {
    UnitQuaternion::from_axis_angle(&Vector3::z_axis(), -screen.radians())
}

/// Hamilton product followed by renormalization
///
/// Keeps composed rotations on the unit sphere regardless of how many
/// products have been chained.
pub fn compose_rotations(
    first: &UnitQuaternion<f32>,
    second: &UnitQuaternion<f32>,
) -> UnitQuaternion<f32> {
    let product: Quaternion<f32> = first.as_ref() * second.as_ref();
    UnitQuaternion::new_normalize(product)
}

/// World-to-camera transform for the current orientation and screen rotation
///
/// Pure and idempotent: identical inputs give bit-identical output.
///
/// # Example
/// ```
/// use parallax_orientation::{compose_transform, OrientationState, ScreenOrientation};
///
/// let state = OrientationState::default();
/// let a = compose_transform(&state, ScreenOrientation::LandscapeLeft);
/// let b = compose_transform(&state, ScreenOrientation::LandscapeLeft);
/// assert_eq!(a, b);
/// ```
pub fn compose_transform(state: &OrientationState, screen: ScreenOrientation) -> Transform {
    let device = compose_rotations(&state.quaternion, &screen_quaternion(screen));
    let rotation = compose_rotations(&device_to_world(), &device.conjugate());
    Transform { rotation }
}
