//! Core types and conventions for the orientation engine

use serde::{Deserialize, Serialize};

use crate::math::{DEG_TO_RAD, RAD_TO_DEG};

/// Device orientation as intrinsic Z-X-Y Euler angles, in radians
///
/// Field names follow the device-orientation event convention:
/// - `yaw`: rotation about the device Z axis (event `alpha`, compass)
/// - `roll`: rotation about the device X axis (event `beta`, front-back tilt)
/// - `pitch`: rotation about the device Y axis (event `gamma`, left-right tilt)
///
/// Values are unbounded; they are only meaningful modulo 2π.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EulerAngles {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl EulerAngles {
    pub const fn new(yaw: f32, pitch: f32, roll: f32) -> Self {
        Self { yaw, pitch, roll }
    }

    /// Build from device-orientation `alpha`, `beta`, `gamma` in degrees
    ///
    /// # Example
    /// ```
    /// use parallax_orientation::EulerAngles;
    ///
    /// let angles = EulerAngles::from_device_degrees(90.0, 0.0, -45.0);
    /// assert!((angles.yaw - core::f32::consts::FRAC_PI_2).abs() < 1e-6);
    /// assert!((angles.pitch + core::f32::consts::FRAC_PI_4).abs() < 1e-6);
    /// ```
    pub fn from_device_degrees(alpha: f32, beta: f32, gamma: f32) -> Self {
        Self {
            yaw: alpha * DEG_TO_RAD,
            pitch: gamma * DEG_TO_RAD,
            roll: beta * DEG_TO_RAD,
        }
    }

    /// Angles in degrees as `(alpha, beta, gamma)`
    pub fn to_device_degrees(&self) -> (f32, f32, f32) {
        (self.yaw * RAD_TO_DEG, self.roll * RAD_TO_DEG, self.pitch * RAD_TO_DEG)
    }

    pub fn is_finite(&self) -> bool {
        self.yaw.is_finite() && self.pitch.is_finite() && self.roll.is_finite()
    }
}

/// Engine settings
///
/// Tuning constants for sensor smoothing and fusion. `gyro_weight` sets how
/// tightly the filter follows the absolute sensors; `output_smoothing` sets
/// how calm the rendered view looks. Neither affects the other.
///
/// # Example
/// ```
/// use parallax_orientation::{EngineSettings, OrientationEngine};
///
/// let settings = EngineSettings {
///     gyro_weight: 0.98,       // trust the compass more
///     output_smoothing: 0.25,  // snappier view
///     ..Default::default()
/// };
/// let engine = OrientationEngine::with_settings(settings).unwrap();
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// One-pole smoothing factor applied to every sensor sample (typically 0.1)
    ///
    /// Used for gravity, magnetic field, absolute Euler channels and compass heading.
    pub sample_smoothing: f32,
    /// Weight of gyroscope integration in the complementary filter (typically 0.995)
    ///
    /// Each absolute sample moves the fast estimate `1 - gyro_weight` of the way
    /// toward the absolute reading.
    pub gyro_weight: f32,
    /// Per-frame smoothing factor of the render-facing orientation (0.08 to 0.25)
    pub output_smoothing: f32,
    /// Accelerometer magnitude at or below which a sample is discarded
    pub gravity_noise_floor: f32,
    /// Longest gap in seconds between gyroscope samples that is still integrated
    ///
    /// Longer gaps (host suspended, sensor paused) reseed the timestamp instead.
    pub max_gyro_interval: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            sample_smoothing: 0.1,
            gyro_weight: 0.995,
            output_smoothing: 0.15,
            gravity_noise_floor: 0.1,
            max_gyro_interval: 1.0,
        }
    }
}

/// Screen (UI) rotation relative to the device's natural orientation
///
/// Composed with the device orientation as a rotation about the viewing axis,
/// never substituted for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScreenOrientation {
    #[default]
    Portrait,
    LandscapeLeft,
    PortraitUpsideDown,
    LandscapeRight,
}

impl ScreenOrientation {
    /// Snap an arbitrary angle in degrees to the nearest quarter turn
    ///
    /// # Example
    /// ```
    /// use parallax_orientation::ScreenOrientation;
    ///
    /// assert_eq!(ScreenOrientation::from_degrees(90), ScreenOrientation::LandscapeLeft);
    /// assert_eq!(ScreenOrientation::from_degrees(-90), ScreenOrientation::LandscapeRight);
    /// assert_eq!(ScreenOrientation::from_degrees(359), ScreenOrientation::Portrait);
    /// ```
    pub fn from_degrees(degrees: i32) -> Self {
        let quarter_turns = ((degrees as f32) / 90.0).round() as i32;
        match quarter_turns.rem_euclid(4) {
            1 => ScreenOrientation::LandscapeLeft,
            2 => ScreenOrientation::PortraitUpsideDown,
            3 => ScreenOrientation::LandscapeRight,
            _ => ScreenOrientation::Portrait,
        }
    }

    pub fn degrees(&self) -> i32 {
        match self {
            ScreenOrientation::Portrait => 0,
            ScreenOrientation::LandscapeLeft => 90,
            ScreenOrientation::PortraitUpsideDown => 180,
            ScreenOrientation::LandscapeRight => 270,
        }
    }

    pub fn radians(&self) -> f32 {
        self.degrees() as f32 * DEG_TO_RAD
    }
}

/// Where the magnetic field estimate came from
///
/// Derived vectors are reconstructed from Euler angles and lose accuracy as
/// the device approaches vertical (beta near ±90°).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagneticSource {
    /// Dedicated magnetometer reading
    Raw,
    /// Approximated from device-orientation Euler angles
    Derived,
}

/// Outcome of the host's sensor permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionState {
    /// No request made yet, or the platform does not gate sensors
    #[default]
    Unknown,
    Granted,
    /// Absolute orientation will not arrive; the engine runs degraded
    Denied,
}

/// Sensor data the fusion filter is corrected toward
///
/// Listed from most to least complete. Device-orientation events take over
/// from any other source as soon as they arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsoluteSource {
    /// Device-orientation Euler events
    Orientation,
    /// World frame built from gravity and a magnetometer, or gravity for tilt
    /// plus a compass heading for yaw
    SensorFrame,
    /// Gravity only; yaw comes from the gyroscope
    Tilt,
    /// Compass heading only; tilt comes from the gyroscope
    Heading,
}

/// Quality of the orientation currently being produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingMode {
    /// Gyroscope fused with absolute readings on every axis
    Absolute,
    /// Some axes corrected by an absolute reading, the rest gyroscope-only
    Partial,
    /// Gyroscope integration only; heading drifts over time
    GyroOnly,
    /// No orientation source yet; the last (or identity) orientation is held
    Stale,
}

impl TrackingMode {
    /// Summarize the active absolute source and whether the gyroscope is integrating
    pub fn from_source(source: Option<AbsoluteSource>, gyroscope_available: bool) -> Self {
        match source {
            Some(AbsoluteSource::Orientation | AbsoluteSource::SensorFrame) => {
                TrackingMode::Absolute
            }
            Some(AbsoluteSource::Tilt | AbsoluteSource::Heading) => TrackingMode::Partial,
            None if gyroscope_available => TrackingMode::GyroOnly,
            None => TrackingMode::Stale,
        }
    }
}

/// Engine sensor status
///
/// Read-only snapshot for hosts and debug overlays.
///
/// # Example
/// ```
/// use parallax_orientation::{OrientationEngine, TrackingMode};
///
/// let engine = OrientationEngine::new();
/// let status = engine.status();
///
/// if status.mode == TrackingMode::GyroOnly {
///     println!("No compass, heading will drift");
/// }
/// assert!(!status.gravity_available);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorStatus {
    /// Whether an accelerometer sample has been accepted
    pub gravity_available: bool,
    /// Whether absolute Euler angles or a compass heading have been received
    pub compass_available: bool,
    /// Whether a gyroscope sample has been integrated
    pub gyroscope_available: bool,
    /// Provenance of the magnetic estimate, if any
    pub magnetic_source: Option<MagneticSource>,
    /// Whether a world frame has been built
    pub world_frame_available: bool,
    /// What the fusion filter is being corrected toward, if anything
    pub absolute_source: Option<AbsoluteSource>,
    /// Host permission outcome
    pub permission: PermissionState,
    /// Summary of the above
    pub mode: TrackingMode,
}
