//! Orientation engine owning every estimate
//!
//! Sensor callbacks either call [`OrientationEngine::handle_sample`]
//! directly or push into a [`SensorSender`]; queued samples are applied in
//! arrival order at the start of the next [`OrientationEngine::update_frame`],
//! so every sample sent before a frame is reflected in that frame's
//! transform.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use nalgebra::Vector3;
use thiserror::Error;

use crate::config::SettingsError;
use crate::frame::{WorldFrame, WorldFrameBuilder, tilt_angles};
use crate::fusion::{FusionFilter, OrientationState};
use crate::sensors::{GravityEstimate, MagneticEstimate, RawSensorSample, SensorNormalizer};
use crate::transform::{Transform, compose_transform};
use crate::types::{
    AbsoluteSource, EngineSettings, EulerAngles, PermissionState, ScreenOrientation, SensorStatus,
    TrackingMode,
};

/// Returned by [`SensorSender`] once its engine has been dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("orientation engine has been dropped")]
pub struct EngineClosed;

#[derive(Debug, Clone, Copy)]
enum EngineEvent {
    Sample(RawSensorSample),
    Screen(ScreenOrientation),
}

/// Clonable handle for delivering sensor events from callbacks or other threads
///
/// Dropping every sender revokes the subscription; the engine keeps running on
/// whatever it has already received.
#[derive(Debug, Clone)]
pub struct SensorSender {
    tx: Sender<EngineEvent>,
}

impl SensorSender {
    /// Queue a sample for the next frame
    pub fn send(&self, sample: impl Into<RawSensorSample>) -> Result<(), EngineClosed> {
        self.tx
            .send(EngineEvent::Sample(sample.into()))
            .map_err(|_| EngineClosed)
    }

    /// Queue a screen rotation change (degrees) for the next frame
    pub fn send_screen_orientation(&self, degrees: i32) -> Result<(), EngineClosed> {
        self.tx
            .send(EngineEvent::Screen(ScreenOrientation::from_degrees(degrees)))
            .map_err(|_| EngineClosed)
    }
}

/// Orientation fusion engine
///
/// # Example
/// ```
/// use parallax_orientation::{
///     AccelerationSample, OrientationEngine, OrientationSample, RotationRateSample,
/// };
///
/// let mut engine = OrientationEngine::new();
/// let sensors = engine.sensor_sender();
///
/// sensors.send(AccelerationSample::new(0.0, -9.81, 0.0)).unwrap();
/// sensors.send(OrientationSample::euler(30.0, 0.0, 0.0)).unwrap();
/// sensors.send(RotationRateSample::new(0.0, 0.0, 0.0, 0.000)).unwrap();
/// sensors.send(RotationRateSample::new(0.0, 0.0, 0.0, 0.016)).unwrap();
///
/// let transform = engine.update_frame();
/// let matrix = transform.matrix4();
/// assert!(matrix.iter().all(|v| v.is_finite()));
/// assert!(engine.status().gravity_available);
/// ```
#[derive(Debug)]
pub struct OrientationEngine {
    settings: EngineSettings,
    sensors: SensorNormalizer,
    filter: FusionFilter,
    frames: WorldFrameBuilder,
    screen: ScreenOrientation,
    permission: PermissionState,
    absolute_source: Option<AbsoluteSource>,
    inbox_tx: Sender<EngineEvent>,
    inbox_rx: Receiver<EngineEvent>,
}

impl OrientationEngine {
    /// Create an engine with default settings
    pub fn new() -> Self {
        Self::from_valid_settings(EngineSettings::default())
    }

    /// Create an engine with specified settings
    ///
    /// Fails when a coefficient is outside its usable range, for example a
    /// `gyro_weight` of 1 or more, which would make the correction diverge.
    pub fn with_settings(settings: EngineSettings) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self::from_valid_settings(settings))
    }

    fn from_valid_settings(settings: EngineSettings) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::channel();
        Self {
            settings,
            sensors: SensorNormalizer::new(settings.sample_smoothing, settings.gravity_noise_floor),
            filter: FusionFilter::new(&settings),
            frames: WorldFrameBuilder::new(),
            screen: ScreenOrientation::default(),
            permission: PermissionState::default(),
            absolute_source: None,
            inbox_tx,
            inbox_rx,
        }
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    /// Handle for queueing samples from sensor callbacks
    pub fn sensor_sender(&self) -> SensorSender {
        SensorSender {
            tx: self.inbox_tx.clone(),
        }
    }

    /// Apply one sensor sample immediately
    pub fn handle_sample(&mut self, sample: &RawSensorSample) {
        match sample {
            RawSensorSample::Acceleration(acceleration) => {
                self.sensors.update_acceleration(acceleration);
            }
            RawSensorSample::Magnetometer(magnetometer) => {
                self.sensors.update_magnetometer(magnetometer);
            }
            RawSensorSample::RotationRate(rate) => {
                self.filter.integrate_rotation_rate(rate);
            }
            RawSensorSample::Orientation(orientation) => {
                if let Some(absolute) = self.sensors.update_orientation(orientation) {
                    if self.absolute_source == Some(AbsoluteSource::Orientation) {
                        self.filter.apply_absolute(&absolute);
                    } else {
                        if let Some(previous) = self.absolute_source {
                            tracing::debug!(?previous, "Orientation events available, reseeding");
                        }
                        self.absolute_source = Some(AbsoluteSource::Orientation);
                        self.filter.seed(&absolute);
                    }
                }
            }
        }
    }

    /// Set the screen rotation in degrees, snapped to a quarter turn
    pub fn set_screen_orientation(&mut self, degrees: i32) {
        let screen = ScreenOrientation::from_degrees(degrees);
        if screen != self.screen {
            tracing::debug!(degrees = screen.degrees(), "Screen orientation changed");
        }
        self.screen = screen;
    }

    pub fn screen_orientation(&self) -> ScreenOrientation {
        self.screen
    }

    /// Record the outcome of the host's sensor permission request
    pub fn set_permission(&mut self, permission: PermissionState) {
        if permission == PermissionState::Denied && self.permission != PermissionState::Denied {
            tracing::warn!(
                "Sensor permission denied, no absolute orientation available; \
                 gyroscope-only tracking will drift"
            );
        }
        self.permission = permission;
    }

    /// Advance one render frame and return its world-to-camera transform
    ///
    /// Drains queued events, rebuilds the world frame, corrects the filter
    /// toward the sensor-derived orientation when no orientation events are
    /// arriving, then steps the output smoothing.
    pub fn update_frame(&mut self) -> Transform {
        self.drain_inbox();

        let gravity = self.sensors.gravity();
        let magnetic = self.sensors.magnetic();
        self.frames.rebuild(gravity.as_ref(), magnetic.as_ref());
        self.apply_sensor_absolute();

        self.filter.smooth_output();
        self.transform()
    }

    /// Absolute angles from the world frame, gravity or compass heading
    ///
    /// Channels a source cannot observe keep the filter's current value, so
    /// they receive no correction.
    fn apply_sensor_absolute(&mut self) {
        if self.absolute_source == Some(AbsoluteSource::Orientation) {
            return;
        }

        let current = self.filter.raw_angles();
        // Compass headings run clockwise, yaw runs counter-clockwise
        let compass_yaw = self.sensors.heading().map(|heading| -heading);

        let (absolute, source) = match (self.frames.frame(), self.sensors.gravity(), compass_yaw) {
            (Some(frame), _, _) => (frame.euler_angles(), AbsoluteSource::SensorFrame),
            (None, Some(gravity), yaw) => {
                let (roll, pitch) = tilt_angles(&gravity.direction);
                match yaw {
                    Some(yaw) => (EulerAngles::new(yaw, pitch, roll), AbsoluteSource::SensorFrame),
                    None => (EulerAngles::new(current.yaw, pitch, roll), AbsoluteSource::Tilt),
                }
            }
            (None, None, Some(yaw)) => (
                EulerAngles { yaw, ..current },
                AbsoluteSource::Heading,
            ),
            (None, None, None) => return,
        };

        if self.absolute_source != Some(source) {
            tracing::debug!(?source, "Absolute orientation source changed");
            self.absolute_source = Some(source);
        }
        self.filter.apply_absolute(&absolute);
    }

    /// Transform for the current state without advancing the frame
    pub fn transform(&self) -> Transform {
        compose_transform(&self.filter.state(), self.screen)
    }

    fn drain_inbox(&mut self) {
        loop {
            match self.inbox_rx.try_recv() {
                Ok(EngineEvent::Sample(sample)) => self.handle_sample(&sample),
                Ok(EngineEvent::Screen(screen)) => self.set_screen_orientation(screen.degrees()),
                // The engine holds a sender itself, so the channel never disconnects
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    /// Smoothed render-facing orientation
    pub fn orientation(&self) -> OrientationState {
        self.filter.state()
    }

    /// Fast internal estimate
    pub fn raw_angles(&self) -> EulerAngles {
        self.filter.raw_angles()
    }

    /// Smoothed absolute angles from orientation events
    pub fn absolute_angles(&self) -> Option<EulerAngles> {
        self.sensors.absolute()
    }

    pub fn gravity(&self) -> Option<GravityEstimate> {
        self.sensors.gravity()
    }

    pub fn magnetic(&self) -> Option<MagneticEstimate> {
        self.sensors.magnetic()
    }

    /// Most recent world frame, possibly from an earlier frame
    pub fn world_frame(&self) -> Option<WorldFrame> {
        self.frames.frame()
    }

    /// Heading of the device's forward axis from the world frame, in radians
    pub fn heading(&self) -> Option<f32> {
        self.world_frame().and_then(|frame| frame.heading_of_device())
    }

    /// Platform compass heading in radians, clockwise from magnetic north
    pub fn compass_heading(&self) -> Option<f32> {
        self.sensors.heading()
    }

    /// Gravity direction for debug overlays, zero when not yet available
    pub fn gravity_vector(&self) -> Vector3<f32> {
        self.gravity()
            .map(|gravity| gravity.direction)
            .unwrap_or_else(Vector3::zeros)
    }

    pub fn status(&self) -> SensorStatus {
        let compass_available = self.sensors.absolute().is_some() || self.sensors.heading().is_some();
        let gyroscope_available = self.filter.gyro_integrated();
        let mode = TrackingMode::from_source(self.absolute_source, gyroscope_available);

        SensorStatus {
            gravity_available: self.sensors.gravity().is_some(),
            compass_available,
            gyroscope_available,
            magnetic_source: self.sensors.magnetic().map(|magnetic| magnetic.source),
            world_frame_available: self.frames.frame().is_some(),
            absolute_source: self.absolute_source,
            permission: self.permission,
            mode,
        }
    }

    /// Return every estimate to its initial value
    ///
    /// Screen orientation, permission and queued events are kept.
    pub fn reset(&mut self) {
        self.sensors.reset();
        self.filter.reset();
        self.frames.reset();
        self.absolute_source = None;
        tracing::debug!("Orientation engine reset");
    }
}

impl Default for OrientationEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{DEG_TO_RAD, euler_to_rotation_matrix, shortest_angle};
    use crate::sensors::{
        AccelerationSample, MagnetometerSample, OrientationSample, RotationRateSample,
    };
    use crate::transform::device_to_world;
    use crate::types::MagneticSource;

    /// Accelerometer and magnetometer readings a device in `pose` would report
    fn raw_readings(pose: &EulerAngles) -> (AccelerationSample, MagnetometerSample) {
        let m = euler_to_rotation_matrix(pose);
        let up = m.row(2).transpose() * 9.81;
        let north = m.row(1).transpose();

        // Field dips 60° below the horizon
        let dip = 60.0 * DEG_TO_RAD;
        let field = (north * dip.cos() - m.row(2).transpose() * dip.sin()) * 45.0;

        (
            AccelerationSample::new(up.x, up.y, up.z),
            MagnetometerSample::new(field.x, field.y, field.z),
        )
    }

    fn assert_angles_close(actual: &EulerAngles, expected: &EulerAngles, tolerance: f32) {
        let errors = [
            shortest_angle(actual.yaw, expected.yaw),
            shortest_angle(actual.pitch, expected.pitch),
            shortest_angle(actual.roll, expected.roll),
        ];
        assert!(
            errors.iter().all(|e| e.abs() < tolerance),
            "{actual:?} vs {expected:?}"
        );
    }

    #[test]
    fn test_new_engine() {
        let engine = OrientationEngine::new();
        let status = engine.status();

        assert_eq!(engine.orientation(), OrientationState::default());
        assert!(!status.gravity_available);
        assert!(!status.compass_available);
        assert_eq!(status.mode, TrackingMode::Stale);
        assert_eq!(status.absolute_source, None);
        assert!(engine.world_frame().is_none());
    }

    #[test]
    fn test_with_settings_validates() {
        let settings = EngineSettings {
            gyro_weight: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            OrientationEngine::with_settings(settings),
            Err(SettingsError::OutOfRange { name: "gyro_weight", .. })
        ));

        let settings = EngineSettings {
            gyro_weight: 0.98,
            ..Default::default()
        };
        let engine = OrientationEngine::with_settings(settings).unwrap();
        assert_eq!(engine.settings().gyro_weight, 0.98);
    }

    #[test]
    fn test_accelerometer_and_magnetometer_drive_orientation() {
        let pose = EulerAngles::from_device_degrees(40.0, 30.0, -20.0);
        let (acceleration, magnetometer) = raw_readings(&pose);

        let mut engine = OrientationEngine::new();
        for _ in 0..300 {
            engine.handle_sample(&acceleration.into());
            engine.handle_sample(&magnetometer.into());
            engine.update_frame();
        }

        assert_angles_close(&engine.orientation().angles, &pose, 1e-3);

        let expected = compose_transform(
            &OrientationState::from_angles(pose),
            ScreenOrientation::Portrait,
        );
        assert!((engine.transform().matrix3() - expected.matrix3()).amax() < 1e-3);

        let status = engine.status();
        assert_eq!(status.mode, TrackingMode::Absolute);
        assert_eq!(status.absolute_source, Some(AbsoluteSource::SensorFrame));
        assert_eq!(status.magnetic_source, Some(MagneticSource::Raw));
    }

    #[test]
    fn test_raw_sensors_move_the_transform() {
        let baseline = OrientationEngine::new().update_frame();

        let mut engine = OrientationEngine::new();
        let mut transform = baseline;
        for _ in 0..200 {
            engine.handle_sample(&AccelerationSample::new(3.0, -9.0, 2.0).into());
            engine.handle_sample(&MagnetometerSample::new(-1.0, 0.0, 0.0).into());
            transform = engine.update_frame();
        }

        assert!((transform.matrix3() - baseline.matrix3()).amax() > 0.1);
        assert!(transform.matrix4().iter().all(|v| v.is_finite()));
        assert_eq!(engine.status().mode, TrackingMode::Absolute);
    }

    #[test]
    fn test_gravity_alone_corrects_tilt() {
        let pose = EulerAngles::from_device_degrees(0.0, -25.0, 35.0);
        let (acceleration, _) = raw_readings(&pose);

        let mut engine = OrientationEngine::new();
        for _ in 0..300 {
            engine.handle_sample(&acceleration.into());
            engine.update_frame();
        }

        assert_angles_close(&engine.orientation().angles, &pose, 1e-3);
        let status = engine.status();
        assert_eq!(status.mode, TrackingMode::Partial);
        assert_eq!(status.absolute_source, Some(AbsoluteSource::Tilt));
    }

    #[test]
    fn test_compass_heading_alone_corrects_yaw() {
        let baseline = OrientationEngine::new().update_frame();
        let heading_only = OrientationSample {
            compass_heading: Some(90.0),
            ..Default::default()
        };

        let mut engine = OrientationEngine::new();
        for _ in 0..200 {
            engine.handle_sample(&heading_only.into());
            engine.update_frame();
        }

        // 90° clockwise from north is -90° of counter-clockwise yaw
        let angles = engine.orientation().angles;
        assert!((angles.yaw + 90.0 * DEG_TO_RAD).abs() < 1e-3, "yaw {}", angles.yaw);
        assert_eq!((angles.pitch, angles.roll), (0.0, 0.0));

        let status = engine.status();
        assert!(status.compass_available);
        assert_eq!(status.mode, TrackingMode::Partial);
        assert_eq!(status.absolute_source, Some(AbsoluteSource::Heading));
        assert!((engine.transform().matrix3() - baseline.matrix3()).amax() > 0.1);
    }

    #[test]
    fn test_compass_heading_pulls_drifting_gyro() {
        let mut engine = OrientationEngine::new();
        let heading_only = OrientationSample {
            compass_heading: Some(0.0),
            ..Default::default()
        };

        // Gyroscope reports a steady 6 deg/s drift while the compass holds north
        for i in 0..1200 {
            engine.handle_sample(&RotationRateSample::new(6.0, 0.0, 0.0, i as f64 / 60.0).into());
            engine.handle_sample(&heading_only.into());
            engine.update_frame();
        }

        // 0.1° of drift per frame settles at 0.1° / 0.005 = 20° instead of growing to 120°
        let yaw = engine.raw_angles().yaw / DEG_TO_RAD;
        assert!((yaw - 20.0).abs() < 1.0, "yaw {yaw}");
    }

    #[test]
    fn test_orientation_events_replace_sensor_frame() {
        let pose = EulerAngles::from_device_degrees(70.0, 10.0, 0.0);
        let (acceleration, magnetometer) = raw_readings(&pose);
        let mut engine = OrientationEngine::new();
        for _ in 0..10 {
            engine.handle_sample(&acceleration.into());
            engine.handle_sample(&magnetometer.into());
            engine.update_frame();
        }
        assert_eq!(engine.status().absolute_source, Some(AbsoluteSource::SensorFrame));

        engine.handle_sample(&OrientationSample::euler(10.0, 20.0, 30.0).into());
        let euler = EulerAngles::from_device_degrees(10.0, 20.0, 30.0);
        assert_eq!(engine.raw_angles(), euler);
        assert_eq!(engine.orientation().angles, euler);

        // Later frames no longer pull toward the magnetometer frame
        for _ in 0..50 {
            engine.handle_sample(&acceleration.into());
            engine.handle_sample(&magnetometer.into());
            engine.update_frame();
        }
        assert_angles_close(&engine.orientation().angles, &euler, 1e-5);
        assert_eq!(engine.status().absolute_source, Some(AbsoluteSource::Orientation));
    }

    #[test]
    fn test_no_data_still_produces_transform() {
        let mut engine = OrientationEngine::new();
        for _ in 0..10 {
            let transform = engine.update_frame();
            assert!(transform.quaternion().coords.iter().all(|c| c.is_finite()));
            assert!((transform.matrix3() - device_to_world().to_rotation_matrix().into_inner()).amax() < 1e-6);
        }
    }

    #[test]
    fn test_queued_samples_applied_before_transform() {
        let mut engine = OrientationEngine::new();
        let sender = engine.sensor_sender();

        sender.send(OrientationSample::euler(90.0, 0.0, 0.0)).unwrap();
        assert!(engine.absolute_angles().is_none());

        engine.update_frame();
        let absolute = engine.absolute_angles().unwrap();
        assert!((absolute.yaw - 90.0 * DEG_TO_RAD).abs() < 1e-6);

        // First absolute reading seeds the output, so the frame already shows it
        assert!((engine.orientation().angles.yaw - 90.0 * DEG_TO_RAD).abs() < 1e-6);
    }

    #[test]
    fn test_queued_screen_orientation() {
        let mut engine = OrientationEngine::new();
        let sender = engine.sensor_sender();
        sender.send_screen_orientation(270).unwrap();

        engine.update_frame();
        assert_eq!(engine.screen_orientation(), ScreenOrientation::LandscapeRight);
    }

    #[test]
    fn test_sender_reports_dropped_engine() {
        let engine = OrientationEngine::new();
        let sender = engine.sensor_sender();
        drop(engine);

        assert_eq!(sender.send(AccelerationSample::new(0.0, 0.0, 9.8)), Err(EngineClosed));
    }

    #[test]
    fn test_sender_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<SensorSender>();
        assert_send::<OrientationEngine>();
    }

    #[test]
    fn test_world_frame_from_raw_sensors() {
        let mut engine = OrientationEngine::new();
        engine.handle_sample(&AccelerationSample::new(0.0, -9.81, 0.0).into());
        engine.handle_sample(&MagnetometerSample::new(0.0, 0.0, -42.0).into());
        assert!(engine.world_frame().is_none());

        engine.update_frame();
        let frame = engine.world_frame().unwrap();
        assert!((frame.up - Vector3::new(0.0, -1.0, 0.0)).norm() < 1e-6);
        assert!(engine.heading().unwrap().abs() < 1e-6);
        assert_eq!(engine.status().magnetic_source, Some(MagneticSource::Raw));
    }

    #[test]
    fn test_gyro_only_mode_after_permission_denied() {
        let mut engine = OrientationEngine::new();
        engine.set_permission(PermissionState::Denied);

        engine.handle_sample(&RotationRateSample::new(30.0, 0.0, 0.0, 0.0).into());
        engine.handle_sample(&RotationRateSample::new(30.0, 0.0, 0.0, 0.5).into());

        let status = engine.status();
        assert_eq!(status.permission, PermissionState::Denied);
        assert_eq!(status.mode, TrackingMode::GyroOnly);

        let transform = engine.update_frame();
        assert!(engine.orientation().angles.yaw > 0.0);
        assert!((transform.quaternion().norm() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_reset_keeps_screen_orientation() {
        let mut engine = OrientationEngine::new();
        engine.set_screen_orientation(90);
        engine.handle_sample(&AccelerationSample::new(0.0, 0.0, 9.81).into());
        engine.update_frame();
        assert_eq!(engine.status().absolute_source, Some(AbsoluteSource::Tilt));
        engine.reset();

        assert!(engine.gravity().is_none());
        assert_eq!(engine.status().absolute_source, None);
        assert_eq!(engine.gravity_vector(), Vector3::zeros());
        assert_eq!(engine.screen_orientation(), ScreenOrientation::LandscapeLeft);
    }
}
