//! Continuous-time IMU noise model.
//!
//! The preintegrator propagates its covariance with a 12×12 continuous noise covariance
//! $Q_c$ that is block diagonal over the four white noise channels, in this order:
//!
//! ```text
//! n = [n_g, n_wg, n_a, n_wa]
//! ```
//!
//! - `n_g`: gyroscope measurement noise (rad/s/√Hz)
//! - `n_wg`: gyroscope bias random walk (rad/s²/√Hz)
//! - `n_a`: accelerometer measurement noise (m/s²/√Hz)
//! - `n_wa`: accelerometer bias random walk (m/s³/√Hz)

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use crate::Matrix12;
use crate::error::CpiError;

/// Standard deviations (densities) of the four continuous noise channels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoiseParameters {
    /// Gyroscope white noise density in rad/s/√Hz
    pub gyro_noise_density: f64,
    /// Gyroscope bias random walk in rad/s²/√Hz
    pub gyro_random_walk: f64,
    /// Accelerometer white noise density in m/s²/√Hz
    pub accel_noise_density: f64,
    /// Accelerometer bias random walk in m/s³/√Hz
    pub accel_random_walk: f64,
}
impl Default for NoiseParameters {
    fn default() -> Self {
        IMUQuality::default().noise_parameters()
    }
}
impl NoiseParameters {
    pub fn new(
        gyro_noise_density: f64,
        gyro_random_walk: f64,
        accel_noise_density: f64,
        accel_random_walk: f64,
    ) -> NoiseParameters {
        NoiseParameters {
            gyro_noise_density,
            gyro_random_walk,
            accel_noise_density,
            accel_random_walk,
        }
    }
    /// Reject negative or non-finite densities.
    pub fn validate(&self) -> Result<(), CpiError> {
        let channels = [
            ("gyro_noise_density", self.gyro_noise_density),
            ("gyro_random_walk", self.gyro_random_walk),
            ("accel_noise_density", self.accel_noise_density),
            ("accel_random_walk", self.accel_random_walk),
        ];
        for (name, value) in channels {
            if !value.is_finite() || value < 0.0 {
                return Err(CpiError::InvalidParameter(format!(
                    "{} must be finite and non-negative, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
    /// Block diagonal continuous noise covariance `diag(σ_g² I, σ_wg² I, σ_a² I, σ_wa² I)`.
    pub fn continuous_covariance(&self) -> Matrix12 {
        let mut q = Matrix12::zeros();
        let identity = Matrix3::<f64>::identity();
        q.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&(identity * self.gyro_noise_density.powi(2)));
        q.fixed_view_mut::<3, 3>(3, 3)
            .copy_from(&(identity * self.gyro_random_walk.powi(2)));
        q.fixed_view_mut::<3, 3>(6, 6)
            .copy_from(&(identity * self.accel_noise_density.powi(2)));
        q.fixed_view_mut::<3, 3>(9, 9)
            .copy_from(&(identity * self.accel_random_walk.powi(2)));
        q
    }
}

/// Enum for characterizing the performance quality of an IMU. Each grade maps to a default set of
/// [NoiseParameters].
///
/// Benchmarks for typical IMU grades are shown below. While these are not strict definitions the power-law distribution and order of magnitude
/// is typical for the associated application. [1]:
///
/// | IMU Grade  | Gyro Bias Instability (°/h) | Gyro ARW (°/√h) | Accel Bias Instability (m/s^2) | Accel VRW (m/s/√h) | Typical Tech         |
/// |------------|-----------------------------|-----------------|--------------------------------|--------------------|----------------------|
/// | Consumer   | >100                        | >1.0            | >0.1                           | >0.1               | Low-cost MEMS        |
/// | Industrial | 10-100                      | 0.1-1.0         | 0.01-0.1                       | 0.03-0.1           | High-end MEMS        |
/// | Tactical   | 0.1-1                       | 0.01-0.1        | 0.001-0.01                     | 0.01-0.03          | High-MEMS / FOG      |
/// | Navigation | 0.0001-0.1                  | 0.005-0.01      | 0.0001-0.001                   | 0.005-0.01         | FOG / RLG            |
/// | Strategic  | <0.0001                     | <0.005          | <0.0001                        | <0.0001            | High-end RLG         |
///
/// The random walk figures convert directly to white noise densities (ARW in °/√h divided by 60 is
/// °/s/√Hz). The bias instability figures are used as the bias random walk densities, which is a
/// coarse but common stand-in when a datasheet gives no rate random walk.
///
/// # References
/// - [1] https://www.advancednavigation.com/tech-articles/mems-vs-fog-what-inertial-system-should-you-choose/
/// - [2] Principles of GNSS, Inertial, and Multisensor Navigation Systems. Chapter 4.4.1, Paul D. Groves, 2nd Edition. Table 4.1
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IMUQuality {
    #[default]
    /// Low cost MEMS sensors found in consumer electronics (e.g. smartphones), wearables, and basic drones
    Consumer,
    /// Higher-end MEMS sensors found in automotive, robotics, and commercial drones
    Industrial,
    /// Typically Fiber-Optic Gyroscopes (FOGs) found in military and high-performance applications
    Tactical,
    /// FOG or Ring-Laser Gyros (RLGs) for long-term use in aircraft, ships, and submarines
    Navigation,
    /// Survey grade RLGs
    Strategic,
}
impl IMUQuality {
    /// Typical gyro bias instability in rad/s
    pub fn gyro_bias_instability(&self) -> f64 {
        let degrees_per_hour = match self {
            IMUQuality::Consumer => 100.0_f64,
            IMUQuality::Industrial => 50.0,
            IMUQuality::Tactical => 1.0,
            IMUQuality::Navigation => 0.01,
            IMUQuality::Strategic => 0.0001,
        };
        degrees_per_hour.to_radians() / 3600.0
    }
    /// Typical gyro angle random walk in rad/s/√Hz
    pub fn gyro_angle_random_walk(&self) -> f64 {
        let degrees_per_root_hour = match self {
            IMUQuality::Consumer => 1.0_f64,
            IMUQuality::Industrial => 0.1,
            IMUQuality::Tactical => 0.01,
            IMUQuality::Navigation => 0.005,
            IMUQuality::Strategic => 0.0005,
        };
        degrees_per_root_hour.to_radians() / 60.0
    }
    /// Typical accelerometer bias instability in m/s^2
    pub fn accel_bias_instability(&self) -> f64 {
        match self {
            IMUQuality::Consumer => 0.1,
            IMUQuality::Industrial => 0.05,
            IMUQuality::Tactical => 0.001,
            IMUQuality::Navigation => 0.0001,
            IMUQuality::Strategic => 0.00001,
        }
    }
    /// Typical accelerometer velocity random walk in m/s^2/√Hz
    pub fn accel_velocity_random_walk(&self) -> f64 {
        let meters_per_second_root_hour = match self {
            IMUQuality::Consumer => 0.1,
            IMUQuality::Industrial => 0.03,
            IMUQuality::Tactical => 0.01,
            IMUQuality::Navigation => 0.005,
            IMUQuality::Strategic => 0.0001,
        };
        meters_per_second_root_hour / 60.0
    }
    pub fn noise_parameters(&self) -> NoiseParameters {
        NoiseParameters {
            gyro_noise_density: self.gyro_angle_random_walk(),
            gyro_random_walk: self.gyro_bias_instability(),
            accel_noise_density: self.accel_velocity_random_walk(),
            accel_random_walk: self.accel_bias_instability(),
        }
    }
}
impl From<IMUQuality> for NoiseParameters {
    fn from(quality: IMUQuality) -> Self {
        quality.noise_parameters()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn continuous_covariance_layout() {
        let noise = NoiseParameters::new(1.0, 2.0, 3.0, 4.0);
        let q = noise.continuous_covariance();
        for (block, sigma) in [1.0, 2.0, 3.0, 4.0_f64].iter().enumerate() {
            for k in 0..3 {
                let i = 3 * block + k;
                assert_approx_eq!(q[(i, i)], sigma.powi(2));
            }
        }
        assert_approx_eq!(q.sum(), 3.0 * (1.0 + 4.0 + 9.0 + 16.0));
        assert_eq!(q, q.transpose());
    }

    #[test]
    fn validate_rejects_bad_densities() {
        assert!(NoiseParameters::new(1e-3, 1e-5, 1e-2, 1e-4).validate().is_ok());
        assert!(NoiseParameters::new(0.0, 0.0, 0.0, 0.0).validate().is_ok());
        assert!(NoiseParameters::new(-1e-3, 1e-5, 1e-2, 1e-4).validate().is_err());
        assert!(NoiseParameters::new(1e-3, f64::NAN, 1e-2, 1e-4).validate().is_err());
        assert!(NoiseParameters::new(1e-3, 1e-5, f64::INFINITY, 1e-4).validate().is_err());
    }

    #[test]
    fn quality_grades_are_ordered() {
        let grades = [
            IMUQuality::Consumer,
            IMUQuality::Industrial,
            IMUQuality::Tactical,
            IMUQuality::Navigation,
            IMUQuality::Strategic,
        ];
        for pair in grades.windows(2) {
            let worse = pair[0].noise_parameters();
            let better = pair[1].noise_parameters();
            assert!(better.gyro_noise_density < worse.gyro_noise_density);
            assert!(better.accel_random_walk < worse.accel_random_walk);
        }
    }

    #[test]
    fn consumer_gyro_density_units() {
        // 1 °/√h → 1/60 °/s/√Hz
        let noise = NoiseParameters::from(IMUQuality::Consumer);
        assert_approx_eq!(noise.gyro_noise_density, 1.0_f64.to_radians() / 60.0, 1e-15);
        assert!(noise.validate().is_ok());
    }
}
