//! Gravity and magnetic field derived world frame
//!
//! The world convention is X = East, Y = Up, Z = South. Basis vectors are
//! expressed in device coordinates and rebuilt from scratch each time, so
//! rounding error never accumulates across frames.

use nalgebra::{Matrix3, Vector3};

use crate::math::{NORMALIZE_EPSILON, cross, normalize};
use crate::types::EulerAngles;
use crate::sensors::{GravityEstimate, MagneticEstimate};

/// Direction the back camera looks along, in device coordinates
pub const DEVICE_FORWARD: Vector3<f32> = Vector3::new(0.0, 0.0, -1.0);

/// `|up.x|` at or above which the Y axis replaces the X axis as fallback
const FALLBACK_AXIS_THRESHOLD: f32 = 0.9;

/// Orthonormal {east, up, north} basis in device coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldFrame {
    pub east: Vector3<f32>,
    pub up: Vector3<f32>,
    pub north: Vector3<f32>,
}

impl WorldFrame {
    /// Build the basis from a gravity and a magnetic field direction
    ///
    /// The magnetic vector is projected onto the plane orthogonal to `up`.
    /// When that projection vanishes (field parallel to gravity) the world X
    /// axis, or the Y axis if `up` lies close to X, is projected instead, so
    /// the result is always a valid basis. Returns `None` only for a zero
    /// gravity vector.
    ///
    /// # Example
    /// ```
    /// use nalgebra::Vector3;
    /// use parallax_orientation::WorldFrame;
    ///
    /// let gravity = Vector3::new(0.0, -1.0, 0.0);
    /// let magnetic = Vector3::new(0.0, 0.0, -1.0);
    /// let frame = WorldFrame::build(&gravity, &magnetic).unwrap();
    ///
    /// assert!((frame.north - magnetic).norm() < 1e-6);
    /// assert!(frame.heading_of_device().unwrap().abs() < 1e-6);
    /// ```
    pub fn build(gravity: &Vector3<f32>, magnetic: &Vector3<f32>) -> Option<Self> {
        let up = normalize(gravity);
        if up == Vector3::zeros() {
            return None;
        }

        let mut north_raw = project_onto_plane(magnetic, &up);
        if north_raw.norm() < NORMALIZE_EPSILON {
            let axis = if up.x.abs() >= FALLBACK_AXIS_THRESHOLD {
                Vector3::y()
            } else {
                Vector3::x()
            };
            tracing::trace!(?axis, "Magnetic field parallel to gravity, using fallback axis");
            north_raw = project_onto_plane(&axis, &up);
        }

        let north = normalize(&north_raw);
        let east = normalize(&cross(&north, &up));
        let north = normalize(&cross(&up, &east));

        Some(Self { east, up, north })
    }

    /// Negated north, the world +Z axis
    pub fn south(&self) -> Vector3<f32> {
        -self.north
    }

    /// Device-to-world rotation with rows {east, up, south}
    pub fn rotation_matrix(&self) -> Matrix3<f32> {
        Matrix3::from_rows(&[
            self.east.transpose(),
            self.up.transpose(),
            self.south().transpose(),
        ])
    }

    /// Heading of a device-frame direction in radians, in (-π, π]
    ///
    /// Measured around `up` from `north` (0) toward `east` (+π/2). `None` when
    /// the direction is parallel to `up` and has no horizontal component.
    pub fn heading(&self, direction: &Vector3<f32>) -> Option<f32> {
        let horizontal = project_onto_plane(direction, &self.up);
        if horizontal.norm() < NORMALIZE_EPSILON {
            return None;
        }
        Some(horizontal.dot(&self.east).atan2(horizontal.dot(&self.north)))
    }

    /// Heading of [`DEVICE_FORWARD`]
    pub fn heading_of_device(&self) -> Option<f32> {
        self.heading(&DEVICE_FORWARD)
    }

    /// Intrinsic Z-X-Y angles of the device relative to an East-North-Up reference
    ///
    /// These are the angles a device-orientation event would report for the
    /// same pose, so the frame can stand in for missing Euler events. At
    /// gimbal lock (device Z axis horizontal) pitch is folded into yaw.
    ///
    /// # Example
    /// ```
    /// use nalgebra::Vector3;
    /// use parallax_orientation::WorldFrame;
    ///
    /// // Flat on a table, top edge pointing north
    /// let gravity = Vector3::new(0.0, 0.0, 9.81);
    /// let magnetic = Vector3::new(0.0, 20.0, -40.0);
    /// let frame = WorldFrame::build(&gravity, &magnetic).unwrap();
    /// let angles = frame.euler_angles();
    /// assert!(angles.yaw.abs() < 1e-6 && angles.pitch.abs() < 1e-6 && angles.roll.abs() < 1e-6);
    /// ```
    pub fn euler_angles(&self) -> EulerAngles {
        let (roll, pitch) = tilt_angles(&self.up);
        let yaw = if horizontal_norm(&self.up) < NORMALIZE_EPSILON {
            self.north.x.atan2(self.east.x)
        } else {
            (-self.east.y).atan2(self.north.y)
        };
        EulerAngles::new(yaw, pitch, roll)
    }
}

/// Roll and pitch `(beta, gamma)` in radians that tilt the device Z axis onto `up`
///
/// Yaw cannot be recovered from gravity alone. Pitch is zero at gimbal lock.
pub fn tilt_angles(up: &Vector3<f32>) -> (f32, f32) {
    let horizontal = horizontal_norm(up);
    let roll = up.y.atan2(horizontal);
    let pitch = if horizontal < NORMALIZE_EPSILON {
        0.0
    } else {
        (-up.x).atan2(up.z)
    };
    (roll, pitch)
}

/// Length of `up` outside the device Y axis
fn horizontal_norm(up: &Vector3<f32>) -> f32 {
    (up.x * up.x + up.z * up.z).sqrt()
}

/// Component of `v` orthogonal to the unit vector `normal`
fn project_onto_plane(v: &Vector3<f32>, normal: &Vector3<f32>) -> Vector3<f32> {
    v - normal * v.dot(normal)
}

/// Keeps the most recent valid world frame
///
/// Stale-but-available beats absent: when an estimate is missing the last
/// frame is retained.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorldFrameBuilder {
    frame: Option<WorldFrame>,
}

impl WorldFrameBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from the current estimates; returns whether a new frame was built
    pub fn rebuild(
        &mut self,
        gravity: Option<&GravityEstimate>,
        magnetic: Option<&MagneticEstimate>,
    ) -> bool {
        let (Some(gravity), Some(magnetic)) = (gravity, magnetic) else {
            return false;
        };

        match WorldFrame::build(&gravity.direction, &magnetic.direction) {
            Some(frame) => {
                if self.frame.is_none() {
                    tracing::debug!(source = ?magnetic.source, "World frame established");
                }
                self.frame = Some(frame);
                true
            }
            None => false,
        }
    }

    pub fn frame(&self) -> Option<WorldFrame> {
        self.frame
    }

    pub fn reset(&mut self) {
        self.frame = None;
    }
}
