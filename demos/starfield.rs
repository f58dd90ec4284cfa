//! Star field replay
//!
//! Replays the recorded sensor session through the orientation engine and
//! projects a handful of world-locked stars into camera space, printing
//! where they would land on screen twice per second.
//!
//! Features demonstrated:
//! - Loading engine settings from TOML
//! - Feeding samples through a `SensorSender` as sensor callbacks would
//! - Per-frame transform and heading readout
//! - Sensor availability status
//!
//! Run with: `cargo run --example starfield`

use nalgebra::Vector3;
use parallax_orientation::{
    AccelerationSample, EngineSettings, MagnetometerSample, OrientationEngine, OrientationSample,
    RAD_TO_DEG, RotationRateSample,
};
use serde::Deserialize;
use std::error::Error;

#[derive(Debug, Deserialize)]
struct SessionRow {
    #[serde(rename = "Time (s)")]
    time: f64,
    #[serde(rename = "Sensor")]
    sensor: String,
    #[serde(rename = "X")]
    x: Option<f32>,
    #[serde(rename = "Y")]
    y: Option<f32>,
    #[serde(rename = "Z")]
    z: Option<f32>,
}

const SETTINGS: &str = r#"
sample_smoothing = 0.1
gyro_weight = 0.99
output_smoothing = 0.2
"#;

/// Focal length of the virtual camera in pixels
const FOCAL_LENGTH: f32 = 800.0;
const REPORT_EVERY: usize = 30;

fn main() -> Result<(), Box<dyn Error>> {
    println!("Star field replay - world-locked stars under device rotation");

    let settings = EngineSettings::from_toml_str(SETTINGS)?;
    let mut engine = OrientationEngine::with_settings(settings)?;
    let sensors = engine.sensor_sender();

    // Stars on a sphere around the viewer, world X east, Y up, Z south
    let stars = [
        ("north", Vector3::new(0.0, 0.0, -500.0)),
        ("north-east", Vector3::new(350.0, 40.0, -350.0)),
        ("east", Vector3::new(500.0, 0.0, 0.0)),
        ("zenith", Vector3::new(0.0, 500.0, 0.0)),
    ];

    let mut reader = csv::Reader::from_path("testdata/sensor_session.csv")?;
    let mut frames = 0;

    for result in reader.deserialize() {
        let row: SessionRow = result?;
        match row.sensor.as_str() {
            "accel" => sensors.send(AccelerationSample {
                x: row.x,
                y: row.y,
                z: row.z,
            })?,
            "gyro" => sensors.send(RotationRateSample {
                alpha: row.x,
                beta: row.y,
                gamma: row.z,
                timestamp: row.time,
            })?,
            "orientation" => sensors.send(OrientationSample {
                alpha: row.x,
                beta: row.y,
                gamma: row.z,
                compass_heading: None,
            })?,
            "mag" => {
                sensors.send(MagnetometerSample {
                    x: row.x,
                    y: row.y,
                    z: row.z,
                })?;

                let transform = engine.update_frame();
                frames += 1;

                if frames % REPORT_EVERY != 0 {
                    continue;
                }

                let (alpha, beta, gamma) = engine.orientation().angles.to_device_degrees();
                let heading = engine
                    .heading()
                    .map(|h| format!("{:7.2}°", h * RAD_TO_DEG))
                    .unwrap_or_else(|| "    n/a".to_string());

                println!(
                    "t={:5.2}s  alpha={alpha:7.2}° beta={beta:6.2}° gamma={gamma:6.2}°  heading={heading}",
                    row.time
                );

                for (name, star) in &stars {
                    let camera = transform.transform_point(star);
                    // Camera looks down -Z
                    if camera.z < 0.0 {
                        let u = FOCAL_LENGTH * camera.x / -camera.z;
                        let v = FOCAL_LENGTH * camera.y / -camera.z;
                        println!("    {name:<10} at ({u:8.1}, {v:8.1}) px");
                    } else {
                        println!("    {name:<10} behind the viewer");
                    }
                }
            }
            other => println!("Skipping unknown sensor kind {other}"),
        }
    }

    let status = engine.status();
    println!("\nProcessed {frames} frames");
    println!("Tracking mode:      {:?}", status.mode);
    println!("Magnetic source:    {:?}", status.magnetic_source);
    println!("World frame built:  {}", status.world_frame_available);
    println!("Final matrix:\n{}", engine.transform().matrix4());

    Ok(())
}
