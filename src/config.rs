//! Loading and validation of [`EngineSettings`]

use thiserror::Error;

use crate::types::EngineSettings;

/// Errors produced while loading engine settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("could not serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("{name} must be within {min}..={max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

impl EngineSettings {
    /// Parse settings from TOML, filling missing keys with defaults
    ///
    /// # Example
    /// ```
    /// use parallax_orientation::EngineSettings;
    ///
    /// let settings = EngineSettings::from_toml_str("gyro_weight = 0.99").unwrap();
    /// assert_eq!(settings.gyro_weight, 0.99);
    /// assert_eq!(settings.sample_smoothing, 0.1);
    ///
    /// assert!(EngineSettings::from_toml_str("gyro_weight = 1.5").is_err());
    /// ```
    pub fn from_toml_str(contents: &str) -> Result<Self, SettingsError> {
        let settings: EngineSettings = toml::from_str(contents)?;
        settings.validate()?;
        tracing::debug!(?settings, "Loaded engine settings");
        Ok(settings)
    }

    /// Serialize settings to pretty TOML
    pub fn to_toml_string(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every coefficient lies in its usable range
    pub fn validate(&self) -> Result<(), SettingsError> {
        check_range("sample_smoothing", self.sample_smoothing as f64, f64::EPSILON, 1.0)?;
        check_range("gyro_weight", self.gyro_weight as f64, 0.0, 1.0 - f64::EPSILON)?;
        check_range("output_smoothing", self.output_smoothing as f64, f64::EPSILON, 1.0)?;
        check_range("gravity_noise_floor", self.gravity_noise_floor as f64, 0.0, f64::MAX)?;
        check_range("max_gyro_interval", self.max_gyro_interval, f64::EPSILON, f64::MAX)?;
        Ok(())
    }
}

fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), SettingsError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(SettingsError::OutOfRange {
            name,
            value,
            min,
            max,
        })
    }
}
