//! Mathematical utilities and nalgebra extensions for the orientation engine
//!
//! Every rotation in this crate uses the same intrinsic Z-X-Y order
//! (yaw about Z, then roll about the new X, then pitch about the new Y),
//! the order platform device-orientation events are reported in.

use nalgebra::{Matrix3, Matrix4, Quaternion, UnitQuaternion, Vector3};

use crate::types::EulerAngles;

/// Mathematical constants
pub const DEG_TO_RAD: f32 = core::f32::consts::PI / 180.0;
pub const RAD_TO_DEG: f32 = 180.0 / core::f32::consts::PI;

/// Vectors shorter than this normalize to zero
pub const NORMALIZE_EPSILON: f32 = 1e-4;

/// Extension trait for Vector3 operations
pub trait Vector3Ext {
    /// Normalize the vector, returning the zero vector when its magnitude is below
    /// [`NORMALIZE_EPSILON`]
    fn safe_normalize(&self) -> Vector3<f32>;

    /// Convert degrees to radians
    fn deg_to_rad(&self) -> Vector3<f32>;

    /// Convert radians to degrees
    fn rad_to_deg(&self) -> Vector3<f32>;
}

impl Vector3Ext for Vector3<f32> {
    fn safe_normalize(&self) -> Vector3<f32> {
        normalize(self)
    }

    fn deg_to_rad(&self) -> Vector3<f32> {
        *self * DEG_TO_RAD
    }

    fn rad_to_deg(&self) -> Vector3<f32> {
        *self * RAD_TO_DEG
    }
}

/// Normalize a vector, returning the zero vector when `|v| < 1e-4`
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use parallax_orientation::math::normalize;
///
/// let unit = normalize(&Vector3::new(3.0, 4.0, 0.0));
/// assert!((unit - Vector3::new(0.6, 0.8, 0.0)).norm() < 1e-6);
///
/// assert_eq!(normalize(&Vector3::new(0.0, 1e-5, 0.0)), Vector3::zeros());
/// ```
pub fn normalize(v: &Vector3<f32>) -> Vector3<f32> {
    let magnitude = v.norm();
    if magnitude < NORMALIZE_EPSILON {
        return Vector3::zeros();
    }
    v / magnitude
}

/// Right-handed cross product `a × b`
pub fn cross(a: &Vector3<f32>, b: &Vector3<f32>) -> Vector3<f32> {
    a.cross(b)
}

/// Linear interpolation between two scalars
pub fn lerp(start: f32, end: f32, t: f32) -> f32 {
    start + (end - start) * t
}

/// Component-wise linear interpolation between two vectors
pub fn lerp_vector(start: &Vector3<f32>, end: &Vector3<f32>, t: f32) -> Vector3<f32> {
    start + (end - start) * t
}

/// Signed shortest angular distance from `from` to `to`, in radians
///
/// The result lies in (-π, π], so moving across the ±180° seam takes the short
/// way round instead of sweeping almost a full turn.
///
/// # Example
/// ```
/// use parallax_orientation::math::{shortest_angle, DEG_TO_RAD, RAD_TO_DEG};
///
/// let delta = shortest_angle(170.0 * DEG_TO_RAD, -170.0 * DEG_TO_RAD);
/// assert!((delta * RAD_TO_DEG - 20.0).abs() < 1e-3);
/// ```
pub fn shortest_angle(from: f32, to: f32) -> f32 {
    let delta = to - from;
    delta.sin().atan2(delta.cos())
}

/// Wrap an angle into (-π, π]
pub fn wrap_angle(angle: f32) -> f32 {
    angle.sin().atan2(angle.cos())
}

/// One-pole low-pass step: `estimate + alpha * (sample - estimate)`
pub fn smooth_vector(estimate: &Vector3<f32>, sample: &Vector3<f32>, alpha: f32) -> Vector3<f32> {
    lerp_vector(estimate, sample, alpha)
}

/// One-pole low-pass step on an angle, following the shortest arc
pub fn smooth_angle(estimate: f32, sample: f32, alpha: f32) -> f32 {
    estimate + alpha * shortest_angle(estimate, sample)
}

/// Rotation matrix for intrinsic Z-X-Y Euler angles
///
/// `R = Rz(yaw) · Rx(roll) · Ry(pitch)`, mapping device coordinates into the
/// reference frame the angles were measured against.
pub fn euler_to_rotation_matrix(angles: &EulerAngles) -> Matrix3<f32> {
    let (s_a, c_a) = angles.yaw.sin_cos();
    let (s_b, c_b) = angles.roll.sin_cos();
    let (s_g, c_g) = angles.pitch.sin_cos();

    Matrix3::new(
        c_a * c_g - s_a * s_b * s_g,
        -c_b * s_a,
        c_a * s_g + c_g * s_a * s_b,
        c_g * s_a + c_a * s_b * s_g,
        c_a * c_b,
        s_a * s_g - c_a * c_g * s_b,
        -c_b * s_g,
        s_b,
        c_b * c_g,
    )
}

/// Unit quaternion for intrinsic Z-X-Y Euler angles
///
/// Equal to `q_z(yaw) · q_x(roll) · q_y(pitch)`.
pub fn euler_to_quaternion(angles: &EulerAngles) -> UnitQuaternion<f32> {
    let (s_z, c_z) = (angles.yaw * 0.5).sin_cos();
    let (s_x, c_x) = (angles.roll * 0.5).sin_cos();
    let (s_y, c_y) = (angles.pitch * 0.5).sin_cos();

    let q = Quaternion::new(
        c_x * c_y * c_z - s_x * s_y * s_z,
        s_x * c_y * c_z - c_x * s_y * s_z,
        c_x * s_y * c_z + s_x * c_y * s_z,
        c_x * c_y * s_z + s_x * s_y * c_z,
    );

    UnitQuaternion::from_quaternion(q)
}

/// Rotation matrix of a (possibly non-unit) quaternion
///
/// Scales by `2 / |q|²` instead of assuming `|q| = 1`, so floating-point drift in
/// the quaternion does not skew or scale the resulting matrix.
pub fn quaternion_to_rotation_matrix(q: &Quaternion<f32>) -> Matrix3<f32> {
    let norm_squared = q.norm_squared();
    if norm_squared < NORMALIZE_EPSILON * NORMALIZE_EPSILON {
        return Matrix3::identity();
    }

    let s = 2.0 / norm_squared;
    let (w, x, y, z) = (q.w, q.i, q.j, q.k);

    Matrix3::new(
        1.0 - s * (y * y + z * z),
        s * (x * y - z * w),
        s * (x * z + y * w),
        s * (x * y + z * w),
        1.0 - s * (x * x + z * z),
        s * (y * z - x * w),
        s * (x * z - y * w),
        s * (y * z + x * w),
        1.0 - s * (x * x + y * y),
    )
}

/// Homogeneous 4x4 form of [`quaternion_to_rotation_matrix`]
pub fn quaternion_to_homogeneous(q: &Quaternion<f32>) -> Matrix4<f32> {
    quaternion_to_rotation_matrix(q).to_homogeneous()
}
