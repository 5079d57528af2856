//! Serializable configuration for opening a [Preintegrator](crate::Preintegrator).
//!
//! A configuration can be read from or written to JSON, YAML or TOML; the format is chosen by
//! the file extension. Example TOML:
//!
//! ```toml
//! gyro_bias = [0.001, -0.002, 0.0005]
//! accel_bias = [0.02, 0.0, -0.01]
//! average_samples = true
//!
//! [noise]
//! gyro_noise_density = 1.7e-4
//! gyro_random_walk = 2.0e-5
//! accel_noise_density = 2.0e-3
//! accel_random_walk = 3.0e-3
//! ```
//!
//! or, using a sensor grade preset, `noise = "tactical"`.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CpiError;
use crate::noise::{IMUQuality, NoiseParameters};

/// Noise model given either as explicit densities or as a sensor grade preset.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NoiseConfig {
    Preset(IMUQuality),
    Explicit(NoiseParameters),
}
impl Default for NoiseConfig {
    fn default() -> Self {
        NoiseConfig::Preset(IMUQuality::default())
    }
}
impl NoiseConfig {
    pub fn parameters(&self) -> NoiseParameters {
        match self {
            NoiseConfig::Preset(quality) => quality.noise_parameters(),
            NoiseConfig::Explicit(parameters) => *parameters,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PreintegrationConfig {
    /// Gyroscope bias linearization point in rad/s
    #[serde(default)]
    pub gyro_bias: [f64; 3],
    /// Accelerometer bias linearization point in m/s^2
    #[serde(default)]
    pub accel_bias: [f64; 3],
    /// Integrate each step with the average of its start and end samples
    #[serde(default)]
    pub average_samples: bool,
    #[serde(default)]
    pub noise: NoiseConfig,
}

impl PreintegrationConfig {
    /// Reject non-finite biases and negative or non-finite noise densities.
    pub fn validate(&self) -> Result<(), CpiError> {
        for (name, bias) in [("gyro_bias", &self.gyro_bias), ("accel_bias", &self.accel_bias)] {
            if bias.iter().any(|b| !b.is_finite()) {
                return Err(CpiError::InvalidParameter(format!(
                    "{} must be finite, got {:?}",
                    name, bias
                )));
            }
        }
        self.noise.parameters().validate()
    }
    /// Write the configuration to a JSON file (pretty-printed).
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> Result<(), CpiError> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
    /// Read the configuration from a JSON file.
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self, CpiError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
    /// Write the configuration as YAML.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), CpiError> {
        let mut file = File::create(path)?;
        let s = serde_yaml::to_string(self)?;
        file.write_all(s.as_bytes())?;
        Ok(())
    }
    /// Read the configuration from YAML.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, CpiError> {
        let file = File::open(path)?;
        Ok(serde_yaml::from_reader(file)?)
    }
    /// Write the configuration as TOML.
    pub fn to_toml<P: AsRef<Path>>(&self, path: P) -> Result<(), CpiError> {
        let mut file = File::create(path)?;
        let s = toml::to_string(self)?;
        file.write_all(s.as_bytes())?;
        Ok(())
    }
    /// Read the configuration from TOML.
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self, CpiError> {
        let mut s = String::new();
        let mut file = File::open(path)?;
        file.read_to_string(&mut s)?;
        Ok(toml::from_str(&s)?)
    }
    /// Generic write: choose format by file extension (.json/.yaml/.yml/.toml)
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CpiError> {
        let p = path.as_ref();
        match extension(p).as_deref() {
            Some("json") => self.to_json(p),
            Some("yaml") | Some("yml") => self.to_yaml(p),
            Some("toml") => self.to_toml(p),
            _ => Err(CpiError::UnsupportedFormat(p.display().to_string())),
        }
    }
    /// Generic read: choose format by file extension (.json/.yaml/.yml/.toml). The result is validated.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CpiError> {
        let p = path.as_ref();
        let config = match extension(p).as_deref() {
            Some("json") => Self::from_json(p),
            Some("yaml") | Some("yml") => Self::from_yaml(p),
            Some("toml") => Self::from_toml(p),
            _ => Err(CpiError::UnsupportedFormat(p.display().to_string())),
        }?;
        config.validate()?;
        Ok(config)
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
}
