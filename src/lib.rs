//! Parallax Orientation - world-locked orientation for handheld parallax rendering
//!
//! This crate fuses the noisy, asynchronous motion sensors of a phone or
//! tablet (accelerometer, gyroscope, magnetometer and platform
//! device-orientation/compass events) into one smoothed, drift-corrected
//! rotation that keeps rendered world-space content locked in place while
//! the device moves.
//!
//! # Features
//!
//! - Complementary filter blending gyroscope integration with absolute compass/tilt readings
//! - Shortest-arc corrections and smoothing, free of ±180° wraparound jumps
//! - Gravity and magnetic field estimates with noise-floor rejection
//! - Orthonormal East/Up/North world frame with a deterministic fallback for degenerate fields
//! - Single intrinsic Z-X-Y rotation convention for every conversion
//! - Screen rotation correction and device-to-world axis remap in one quaternion
//! - Graceful degradation: any subset of sensors, including none, yields a valid rotation
//!
//! # Quick Start
//!
//! ```rust
//! use parallax_orientation::{
//!     AccelerationSample, OrientationEngine, OrientationSample, RotationRateSample,
//! };
//!
//! let mut engine = OrientationEngine::new();
//!
//! // Feed sensor events as they arrive
//! engine.handle_sample(&AccelerationSample::new(0.0, -9.81, 0.0).into());
//! engine.handle_sample(&OrientationSample::euler(45.0, 10.0, 0.0).into());
//! engine.handle_sample(&RotationRateSample::new(5.0, 0.0, 0.0, 0.000).into());
//! engine.handle_sample(&RotationRateSample::new(5.0, 0.0, 0.0, 0.016).into());
//!
//! // Once per rendered frame
//! let transform = engine.update_frame();
//! let model_view = transform.matrix4();
//!
//! // Rotate world-space points into camera space
//! let star = nalgebra::Vector3::new(10.0, 0.0, -200.0);
//! let in_camera = transform.transform_point(&star);
//! assert!(in_camera.iter().all(|c| c.is_finite()));
//! # let _ = model_view;
//! ```

pub mod config;
mod engine;
pub mod frame;
mod fusion;
pub mod math;
pub mod sensors;
pub mod transform;
mod types;

// Re-export all public types and functions
pub use config::SettingsError;
pub use engine::{EngineClosed, OrientationEngine, SensorSender};
pub use frame::{DEVICE_FORWARD, WorldFrame, WorldFrameBuilder, tilt_angles};
pub use fusion::{FusionFilter, OrientationState};
pub use math::{DEG_TO_RAD, RAD_TO_DEG, Vector3Ext, shortest_angle, wrap_angle};
pub use sensors::{
    AccelerationSample, GravityEstimate, MagneticEstimate, MagnetometerSample, OrientationSample,
    RawSensorSample, RotationRateSample, SensorNormalizer,
};
pub use transform::{Transform, compose_transform};
pub use types::*;
