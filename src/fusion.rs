//! Complementary filter fusing gyroscope integration with absolute angles
//!
//! Two estimates are kept. The fast (raw) angles follow the sensors as
//! tightly as possible: gyroscope rates are integrated into them and every
//! absolute compass/tilt reading nudges them along the shortest arc. The
//! public angles trail the raw ones through a once-per-frame low-pass, and
//! are what the renderer sees.

use nalgebra::UnitQuaternion;

use crate::math::{euler_to_quaternion, shortest_angle, smooth_angle, wrap_angle};
use crate::sensors::RotationRateSample;
use crate::types::{EngineSettings, EulerAngles};

/// Smoothed orientation handed to the transform composer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationState {
    /// Smoothed intrinsic Z-X-Y angles in radians
    pub angles: EulerAngles,
    /// Unit quaternion equivalent of `angles`
    pub quaternion: UnitQuaternion<f32>,
}

impl Default for OrientationState {
    fn default() -> Self {
        Self {
            angles: EulerAngles::default(),
            quaternion: UnitQuaternion::identity(),
        }
    }
}

impl OrientationState {
    pub fn from_angles(angles: EulerAngles) -> Self {
        Self {
            angles,
            quaternion: euler_to_quaternion(&angles),
        }
    }
}

/// Angle fusion filter
///
/// # Example
/// ```
/// use parallax_orientation::{EngineSettings, EulerAngles, FusionFilter, RotationRateSample};
///
/// let mut filter = FusionFilter::new(&EngineSettings::default());
///
/// // First gyroscope sample only establishes the time base
/// filter.integrate_rotation_rate(&RotationRateSample::new(90.0, 0.0, 0.0, 0.00));
/// filter.integrate_rotation_rate(&RotationRateSample::new(90.0, 0.0, 0.0, 0.10));
/// assert!((filter.raw_angles().yaw.to_degrees() - 9.0).abs() < 1e-3);
///
/// let state = filter.smooth_output();
/// assert!(state.angles.yaw > 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct FusionFilter {
    gyro_weight: f32,
    output_smoothing: f32,
    max_gyro_interval: f64,
    /// Fast estimate driven by the gyroscope and absolute corrections
    raw: EulerAngles,
    /// Render-facing estimate
    state: OrientationState,
    last_gyro_timestamp: Option<f64>,
    gyro_integrated: bool,
    absolute_seeded: bool,
}

impl FusionFilter {
    pub fn new(settings: &EngineSettings) -> Self {
        Self {
            gyro_weight: settings.gyro_weight,
            output_smoothing: settings.output_smoothing,
            max_gyro_interval: settings.max_gyro_interval,
            raw: EulerAngles::default(),
            state: OrientationState::default(),
            last_gyro_timestamp: None,
            gyro_integrated: false,
            absolute_seeded: false,
        }
    }

    /// Integrate a gyroscope sample into the raw angles
    ///
    /// The time step is the difference between this sample's timestamp and the
    /// previous one. The first sample, a non-increasing timestamp, or a gap
    /// longer than `max_gyro_interval` only re-establishes the time base.
    /// Returns whether the sample was integrated.
    pub fn integrate_rotation_rate(&mut self, sample: &RotationRateSample) -> bool {
        let previous = self.last_gyro_timestamp.replace(sample.timestamp);
        let Some(previous) = previous else {
            tracing::debug!(timestamp = sample.timestamp, "Gyroscope time base seeded");
            return false;
        };

        let delta_time = sample.timestamp - previous;
        if !(delta_time > 0.0 && delta_time <= self.max_gyro_interval) {
            tracing::trace!(delta_time, "Gyroscope gap out of range, time base reseeded");
            return false;
        }

        let rate = sample.angular_velocity();
        if !rate.is_finite() {
            return false;
        }

        let dt = delta_time as f32;
        self.raw = EulerAngles {
            yaw: wrap_angle(self.raw.yaw + rate.yaw * dt),
            pitch: wrap_angle(self.raw.pitch + rate.pitch * dt),
            roll: wrap_angle(self.raw.roll + rate.roll * dt),
        };
        self.gyro_integrated = true;
        true
    }

    /// Apply an absolute (compass/tilt) reading
    ///
    /// The first reading, and every reading before any gyroscope sample has
    /// been integrated, is taken as-is. After that the complementary
    /// correction of [`FusionFilter::correct`] is used.
    pub fn apply_absolute(&mut self, absolute: &EulerAngles) {
        if !self.absolute_seeded {
            self.seed(absolute);
        } else if !self.gyro_integrated {
            self.raw = *absolute;
        } else {
            self.correct(absolute);
        }
    }

    /// Take an absolute reading as both the raw and the render-facing estimate
    ///
    /// Used for the first reading, and when a more complete absolute source
    /// replaces the one the filter was following.
    pub fn seed(&mut self, absolute: &EulerAngles) {
        self.raw = *absolute;
        self.state = OrientationState::from_angles(*absolute);
        self.absolute_seeded = true;
        tracing::debug!(
            yaw = absolute.yaw,
            pitch = absolute.pitch,
            roll = absolute.roll,
            "Orientation seeded from absolute reading"
        );
    }

    /// Complementary filter step toward an absolute reading
    ///
    /// `raw += (1 - gyro_weight) * shortest_angle(raw, absolute)` per channel.
    pub fn correct(&mut self, absolute: &EulerAngles) {
        let k = 1.0 - self.gyro_weight;
        self.raw.yaw += k * shortest_angle(self.raw.yaw, absolute.yaw);
        self.raw.pitch += k * shortest_angle(self.raw.pitch, absolute.pitch);
        self.raw.roll += k * shortest_angle(self.raw.roll, absolute.roll);
    }

    /// Advance the render-facing estimate by one frame
    pub fn smooth_output(&mut self) -> OrientationState {
        let previous = self.state.angles;
        let angles = EulerAngles {
            yaw: wrap_angle(smooth_angle(previous.yaw, self.raw.yaw, self.output_smoothing)),
            pitch: wrap_angle(smooth_angle(previous.pitch, self.raw.pitch, self.output_smoothing)),
            roll: wrap_angle(smooth_angle(previous.roll, self.raw.roll, self.output_smoothing)),
        };
        self.state = OrientationState::from_angles(angles);
        self.state
    }

    /// Current render-facing estimate
    pub fn state(&self) -> OrientationState {
        self.state
    }

    /// Fast estimate the filter tracks internally
    pub fn raw_angles(&self) -> EulerAngles {
        self.raw
    }

    pub fn gyro_integrated(&self) -> bool {
        self.gyro_integrated
    }

    pub fn absolute_seeded(&self) -> bool {
        self.absolute_seeded
    }

    pub fn reset(&mut self) {
        self.raw = EulerAngles::default();
        self.state = OrientationState::default();
        self.last_gyro_timestamp = None;
        self.gyro_integrated = false;
        self.absolute_seeded = false;
    }
}
