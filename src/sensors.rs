//! Raw sensor events and their normalization into smoothed estimates
//!
//! Platform sensor APIs disagree on units and frequently leave fields
//! undefined. Everything in this module converts those events into unit
//! vectors and radian angles, discarding samples that carry no usable
//! information instead of reporting errors.

use nalgebra::Vector3;

use crate::math::{DEG_TO_RAD, normalize, smooth_angle, smooth_vector};
use crate::types::{EulerAngles, MagneticSource};

/// Accelerometer reading including gravity, in m/s² (device frame)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AccelerationSample {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub z: Option<f32>,
}

impl AccelerationSample {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: Some(z),
        }
    }

    /// Reading as a vector with missing axes set to zero
    pub fn vector(&self) -> Vector3<f32> {
        Vector3::new(
            self.x.unwrap_or(0.0),
            self.y.unwrap_or(0.0),
            self.z.unwrap_or(0.0),
        )
    }
}

/// Gyroscope angular velocity in deg/s about the device Z (`alpha`), X (`beta`)
/// and Y (`gamma`) axes
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RotationRateSample {
    pub alpha: Option<f32>,
    pub beta: Option<f32>,
    pub gamma: Option<f32>,
    /// Monotonic event time in seconds
    pub timestamp: f64,
}

impl RotationRateSample {
    pub const fn new(alpha: f32, beta: f32, gamma: f32, timestamp: f64) -> Self {
        Self {
            alpha: Some(alpha),
            beta: Some(beta),
            gamma: Some(gamma),
            timestamp,
        }
    }

    /// Angular velocity in rad/s, mapped onto the fused angle channels
    /// (alpha drives yaw, beta drives roll, gamma drives pitch)
    pub fn angular_velocity(&self) -> EulerAngles {
        EulerAngles::from_device_degrees(
            self.alpha.unwrap_or(0.0),
            self.beta.unwrap_or(0.0),
            self.gamma.unwrap_or(0.0),
        )
    }
}

/// Device orientation event
///
/// Carries intrinsic Z-X-Y Euler angles in degrees, a platform compass
/// heading (degrees clockwise from magnetic north), or both. The heading is
/// a separate quantity and is never folded into `alpha`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OrientationSample {
    pub alpha: Option<f32>,
    pub beta: Option<f32>,
    pub gamma: Option<f32>,
    pub compass_heading: Option<f32>,
}

impl OrientationSample {
    pub const fn euler(alpha: f32, beta: f32, gamma: f32) -> Self {
        Self {
            alpha: Some(alpha),
            beta: Some(beta),
            gamma: Some(gamma),
            compass_heading: None,
        }
    }

    /// Euler angles in radians, or `None` when every Euler field is missing
    pub fn angles(&self) -> Option<EulerAngles> {
        if self.alpha.is_none() && self.beta.is_none() && self.gamma.is_none() {
            return None;
        }
        Some(EulerAngles::from_device_degrees(
            self.alpha.unwrap_or(0.0),
            self.beta.unwrap_or(0.0),
            self.gamma.unwrap_or(0.0),
        ))
    }

    /// Compass heading in radians
    pub fn heading(&self) -> Option<f32> {
        self.compass_heading
            .filter(|heading| heading.is_finite())
            .map(|heading| heading * DEG_TO_RAD)
    }
}

/// Dedicated magnetometer reading in the device frame (arbitrary units)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MagnetometerSample {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub z: Option<f32>,
}

impl MagnetometerSample {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: Some(z),
        }
    }

    pub fn vector(&self) -> Vector3<f32> {
        Vector3::new(
            self.x.unwrap_or(0.0),
            self.y.unwrap_or(0.0),
            self.z.unwrap_or(0.0),
        )
    }
}

/// One event from a platform sensor callback
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawSensorSample {
    Acceleration(AccelerationSample),
    RotationRate(RotationRateSample),
    Orientation(OrientationSample),
    Magnetometer(MagnetometerSample),
}

impl From<AccelerationSample> for RawSensorSample {
    fn from(sample: AccelerationSample) -> Self {
        RawSensorSample::Acceleration(sample)
    }
}

impl From<RotationRateSample> for RawSensorSample {
    fn from(sample: RotationRateSample) -> Self {
        RawSensorSample::RotationRate(sample)
    }
}

impl From<OrientationSample> for RawSensorSample {
    fn from(sample: OrientationSample) -> Self {
        RawSensorSample::Orientation(sample)
    }
}

impl From<MagnetometerSample> for RawSensorSample {
    fn from(sample: MagnetometerSample) -> Self {
        RawSensorSample::Magnetometer(sample)
    }
}

/// Smoothed unit gravity direction in the device frame
///
/// Points along the accelerometer reading as reported; no sign flip is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GravityEstimate {
    pub direction: Vector3<f32>,
}

/// Smoothed unit magnetic field direction in the device frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MagneticEstimate {
    pub direction: Vector3<f32>,
    pub source: MagneticSource,
}

/// Approximate magnetic field direction implied by Euler angles
///
/// `(-cos β · sin α, -sin β, -cos β · cos α)`. The horizontal information
/// collapses as β approaches ±90°, so headings derived from it become
/// unreliable when the device is held vertically.
pub fn derived_magnetic_vector(angles: &EulerAngles) -> Vector3<f32> {
    let (s_a, c_a) = angles.yaw.sin_cos();
    let (s_b, c_b) = angles.roll.sin_cos();
    Vector3::new(-c_b * s_a, -s_b, -c_b * c_a)
}

/// Converts raw sensor events into smoothed estimates
///
/// Owns the gravity, magnetic, absolute-angle and compass-heading estimates.
/// Every update writes a single estimate by whole-value assignment.
#[derive(Debug, Clone)]
pub struct SensorNormalizer {
    smoothing: f32,
    noise_floor: f32,
    gravity: Option<GravityEstimate>,
    magnetic: Option<MagneticEstimate>,
    absolute: Option<EulerAngles>,
    heading: Option<f32>,
}

impl SensorNormalizer {
    pub fn new(smoothing: f32, noise_floor: f32) -> Self {
        Self {
            smoothing,
            noise_floor,
            gravity: None,
            magnetic: None,
            absolute: None,
            heading: None,
        }
    }

    /// Blend an accelerometer sample into the gravity estimate
    ///
    /// Returns `false` when the sample was discarded because its magnitude is
    /// at or below the noise floor (free fall or a glitched reading).
    pub fn update_acceleration(&mut self, sample: &AccelerationSample) -> bool {
        let vector = sample.vector();
        let magnitude = vector.norm();
        if !magnitude.is_finite() || magnitude <= self.noise_floor {
            tracing::trace!(magnitude, "Discarded accelerometer sample");
            return false;
        }

        let unit = vector / magnitude;
        let direction = match self.gravity {
            Some(previous) => {
                let blended = smooth_vector(&previous.direction, &unit, self.smoothing);
                let renormalized = normalize(&blended);
                // Opposite readings can cancel out, keep the previous estimate then
                if renormalized == Vector3::zeros() {
                    previous.direction
                } else {
                    renormalized
                }
            }
            None => {
                tracing::debug!(x = unit.x, y = unit.y, z = unit.z, "Gravity estimate seeded");
                unit
            }
        };

        self.gravity = Some(GravityEstimate { direction });
        true
    }

    /// Blend a dedicated magnetometer sample into the magnetic estimate
    pub fn update_magnetometer(&mut self, sample: &MagnetometerSample) -> bool {
        let unit = normalize(&sample.vector());
        if unit == Vector3::zeros() || !unit.iter().all(|c| c.is_finite()) {
            tracing::trace!("Discarded magnetometer sample");
            return false;
        }

        let direction = match self.magnetic {
            Some(previous) if previous.source == MagneticSource::Raw => {
                let blended = normalize(&smooth_vector(&previous.direction, &unit, self.smoothing));
                if blended == Vector3::zeros() {
                    previous.direction
                } else {
                    blended
                }
            }
            previous => {
                if previous.is_some() {
                    tracing::debug!("Magnetometer available, replacing derived magnetic estimate");
                }
                unit
            }
        };

        self.magnetic = Some(MagneticEstimate {
            direction,
            source: MagneticSource::Raw,
        });
        true
    }

    /// Blend a device-orientation event into the absolute angles and compass heading
    ///
    /// Returns the smoothed absolute angles when the event carried Euler angles.
    /// Events with no Euler angles and no heading are discarded.
    pub fn update_orientation(&mut self, sample: &OrientationSample) -> Option<EulerAngles> {
        if let Some(heading) = sample.heading() {
            let smoothed = match self.heading {
                Some(previous) => smooth_angle(previous, heading, self.smoothing),
                None => heading,
            };
            self.heading = Some(smoothed);
        }

        let Some(angles) = sample.angles().filter(EulerAngles::is_finite) else {
            if sample.compass_heading.is_none() {
                tracing::trace!("Discarded orientation sample without angles");
            }
            return None;
        };

        let smoothed = match self.absolute {
            Some(previous) => EulerAngles {
                yaw: smooth_angle(previous.yaw, angles.yaw, self.smoothing),
                pitch: smooth_angle(previous.pitch, angles.pitch, self.smoothing),
                roll: smooth_angle(previous.roll, angles.roll, self.smoothing),
            },
            None => angles,
        };
        self.absolute = Some(smoothed);

        // The vector is smoothed on its own, so derive it from this sample
        self.update_derived_magnetic(&angles);
        Some(smoothed)
    }

    /// Feed the Euler-derived magnetic vector unless a magnetometer has reported
    fn update_derived_magnetic(&mut self, angles: &EulerAngles) {
        let derived = derived_magnetic_vector(angles);
        let direction = match self.magnetic {
            Some(previous) if previous.source == MagneticSource::Raw => return,
            Some(previous) => {
                let blended = normalize(&smooth_vector(&previous.direction, &derived, self.smoothing));
                if blended == Vector3::zeros() {
                    previous.direction
                } else {
                    blended
                }
            }
            None => derived,
        };

        self.magnetic = Some(MagneticEstimate {
            direction,
            source: MagneticSource::Derived,
        });
    }

    pub fn gravity(&self) -> Option<GravityEstimate> {
        self.gravity
    }

    pub fn magnetic(&self) -> Option<MagneticEstimate> {
        self.magnetic
    }

    /// Smoothed absolute Euler angles from orientation events
    pub fn absolute(&self) -> Option<EulerAngles> {
        self.absolute
    }

    /// Smoothed compass heading in radians, clockwise from magnetic north
    pub fn heading(&self) -> Option<f32> {
        self.heading
    }

    pub fn reset(&mut self) {
        self.gravity = None;
        self.magnetic = None;
        self.absolute = None;
        self.heading = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> SensorNormalizer {
        SensorNormalizer::new(0.1, 0.1)
    }

    #[test]
    fn test_first_acceleration_seeds_unit_gravity() {
        let mut sensors = normalizer();
        assert!(sensors.update_acceleration(&AccelerationSample::new(0.0, 0.0, 9.81)));

        let gravity = sensors.gravity().unwrap();
        assert!((gravity.direction - Vector3::new(0.0, 0.0, 1.0)).norm() < 1e-6);
    }

    #[test]
    fn test_acceleration_below_noise_floor_is_discarded() {
        let mut sensors = normalizer();
        sensors.update_acceleration(&AccelerationSample::new(0.0, -9.81, 0.0));
        let before = sensors.gravity();

        assert!(!sensors.update_acceleration(&AccelerationSample::new(0.05, 0.0, 0.05)));
        assert!(!sensors.update_acceleration(&AccelerationSample::default()));
        assert_eq!(sensors.gravity(), before);
    }

    #[test]
    fn test_missing_axes_default_to_zero() {
        let sample = AccelerationSample {
            x: None,
            y: Some(-9.0),
            z: None,
        };
        assert_eq!(sample.vector(), Vector3::new(0.0, -9.0, 0.0));
    }

    #[test]
    fn test_gravity_smoothing_is_one_pole() {
        let mut sensors = normalizer();
        sensors.update_acceleration(&AccelerationSample::new(0.0, 0.0, 1.0));
        sensors.update_acceleration(&AccelerationSample::new(1.0, 0.0, 0.0));

        // 10% of the way from +Z to +X, then renormalized
        let expected = normalize(&Vector3::new(0.1, 0.0, 0.9));
        let gravity = sensors.gravity().unwrap();
        assert!((gravity.direction - expected).norm() < 1e-6);
        assert!((gravity.direction.norm() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_orientation_without_angles_is_discarded() {
        let mut sensors = normalizer();
        assert!(sensors.update_orientation(&OrientationSample::default()).is_none());
        assert!(sensors.absolute().is_none());
        assert!(sensors.magnetic().is_none());
    }

    #[test]
    fn test_compass_heading_kept_separate() {
        let mut sensors = normalizer();
        let sample = OrientationSample {
            compass_heading: Some(90.0),
            ..Default::default()
        };

        assert!(sensors.update_orientation(&sample).is_none());
        assert!((sensors.heading().unwrap() - 90.0 * DEG_TO_RAD).abs() < 1e-6);
        assert!(sensors.absolute().is_none());
    }

    #[test]
    fn test_partial_euler_fields_default_to_zero() {
        let mut sensors = normalizer();
        let sample = OrientationSample {
            alpha: Some(45.0),
            ..Default::default()
        };

        let angles = sensors.update_orientation(&sample).unwrap();
        assert!((angles.yaw - 45.0 * DEG_TO_RAD).abs() < 1e-6);
        assert_eq!(angles.pitch, 0.0);
        assert_eq!(angles.roll, 0.0);
    }

    #[test]
    fn test_euler_smoothing_crosses_seam() {
        let mut sensors = normalizer();
        sensors.update_orientation(&OrientationSample::euler(179.0, 0.0, 0.0));
        let angles = sensors
            .update_orientation(&OrientationSample::euler(-179.0, 0.0, 0.0))
            .unwrap();

        // 10% of the 2° short arc, not of the 358° long one
        assert!((angles.yaw - 179.2 * DEG_TO_RAD).abs() < 1e-4);
    }

    #[test]
    fn test_derived_magnetic_from_euler() {
        let mut sensors = normalizer();
        sensors.update_orientation(&OrientationSample::euler(0.0, 0.0, 0.0));

        let magnetic = sensors.magnetic().unwrap();
        assert_eq!(magnetic.source, MagneticSource::Derived);
        assert!((magnetic.direction - Vector3::new(0.0, 0.0, -1.0)).norm() < 1e-6);
    }

    #[test]
    fn test_derived_magnetic_is_smoothed_once() {
        let mut sensors = normalizer();
        sensors.update_orientation(&OrientationSample::euler(0.0, 0.0, 0.0));
        sensors.update_orientation(&OrientationSample::euler(90.0, 0.0, 0.0));

        // 10% of the way from the yaw 0° vector to the yaw 90° vector
        let expected = normalize(&Vector3::new(-0.1, 0.0, -0.9));
        let magnetic = sensors.magnetic().unwrap();
        assert!((magnetic.direction - expected).norm() < 1e-5, "{:?}", magnetic.direction);
    }

    #[test]
    fn test_raw_magnetometer_preferred_over_derived() {
        let mut sensors = normalizer();
        sensors.update_orientation(&OrientationSample::euler(30.0, 10.0, 0.0));
        assert_eq!(sensors.magnetic().unwrap().source, MagneticSource::Derived);

        sensors.update_magnetometer(&MagnetometerSample::new(0.0, 0.0, -40.0));
        let raw = sensors.magnetic().unwrap();
        assert_eq!(raw.source, MagneticSource::Raw);
        assert!((raw.direction - Vector3::new(0.0, 0.0, -1.0)).norm() < 1e-6);

        // Later Euler events must not overwrite the raw reading
        sensors.update_orientation(&OrientationSample::euler(120.0, 45.0, 0.0));
        assert_eq!(sensors.magnetic(), Some(raw));
    }

    #[test]
    fn test_zero_magnetometer_is_discarded() {
        let mut sensors = normalizer();
        assert!(!sensors.update_magnetometer(&MagnetometerSample::default()));
        assert!(sensors.magnetic().is_none());
    }
}
