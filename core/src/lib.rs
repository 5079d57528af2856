//! Closed-form IMU preintegration
//!
//! This crate summarizes a run of high-rate inertial measurements (angular rate and specific force
//! pairs) between two reference instants into a single relative rotation, velocity increment and
//! position increment, together with their first-order sensitivity to the gyroscope and
//! accelerometer bias estimates and the covariance of the 15-dimensional error state. A host
//! estimator (e.g. a visual-inertial odometry filter) folds many IMU samples into one low-rate
//! update with this summary rather than re-integrating the nonlinear IMU dynamics at update time.
//!
//! The crate does not buffer samples, estimate biases, or own a navigation state. It is a pure
//! numerical transform: given consecutive sample pairs and fixed bias linearization points it
//! updates a [Preintegrator] in place.
//!
//! ## Crate overview
//!
//! - [preintegration]: the [Preintegrator] accumulator, its error-state `F`/`G` matrices and the RK4 covariance step.
//! - [coefficients]: the small-angle/general evaluation of every trigonometric coefficient.
//! - [linalg]: skew-symmetric matrices, symmetrization and rotation conversions.
//! - [noise]: continuous IMU noise model and typical sensor grades.
//! - [config]: serializable configuration (JSON/YAML/TOML).
//! - [replay]: CSV IMU logs and a driver that feeds a time window of samples to a [Preintegrator].
//! - [error]: error type for the configuration and replay layers.
//!
//! ## Conventions
//!
//! The relative rotation $R$ maps vectors expressed in the interval-start frame into the current
//! IMU frame. A step with constant bias-compensated rate $\hat\omega$ over $\Delta t$ updates it as
//!
//! $$
//! R(+) = \exp(-[\hat\omega \Delta t]_\times) R(-)
//! $$
//!
//! where $[x]_\times$ is the skew-symmetric matrix of $x$:
//!
//! $$
//! x = \begin{bmatrix} a \\\\ b \\\\ c \end{bmatrix} \rightarrow [x]_\times = \begin{bmatrix} 0 & -c & b \\\\ c & 0 & -a \\\\ -b & a & 0 \end{bmatrix}
//! $$
//!
//! The velocity and position contributions $\beta$ and $\alpha$ are expressed in the interval-start
//! frame and do not include gravity; the host adds gravity and initial velocity terms itself.
//!
//! The error state is ordered
//!
//! $$
//! \delta x = [\delta\theta, \delta b_g, \delta\beta, \delta b_a, \delta\alpha]
//! $$
//!
//! and the continuous white noise vector is ordered
//!
//! $$
//! n = [n_g, n_{wg}, n_a, n_{wa}]
//! $$
//!
//! (gyroscope noise, gyroscope bias random walk, accelerometer noise, accelerometer bias random walk).
//!
//! ## Concurrency
//!
//! A [Preintegrator] is a plain value with no interior mutability. Calls on one instance must be
//! made in chronological order by a single owner; independent instances can be advanced on
//! separate threads.
pub mod coefficients;
pub mod config;
pub mod error;
pub mod linalg;
pub mod noise;
pub mod preintegration;
pub mod replay;

use nalgebra::{SMatrix, Vector3};
use std::fmt::{self, Display};

pub use coefficients::{AngleCoefficients, SMALL_ANGLE_THRESHOLD};
pub use error::CpiError;
pub use preintegration::{BiasCorrectedMeans, PreintegratedSummary, Preintegrator};

/// 12×12 continuous noise covariance
pub type Matrix12 = SMatrix<f64, 12, 12>;
/// 15×15 error-state matrix
pub type Matrix15 = SMatrix<f64, 15, 15>;
/// 15×12 noise injection matrix
pub type Matrix15x12 = SMatrix<f64, 15, 12>;

/// Basic structure for holding one raw IMU sample in the form of sensed acceleration and angular rate vectors.
///
/// The vectors are in the body frame of the IMU and are not gravity compensated.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IMUData {
    /// Specific force in m/s^2, body frame x, y, z axis
    pub accel: Vector3<f64>,
    /// Angular rate in rad/s, body frame x, y, z axis
    pub gyro: Vector3<f64>,
}
impl IMUData {
    pub fn new(accel: Vector3<f64>, gyro: Vector3<f64>) -> IMUData {
        IMUData { accel, gyro }
    }
}
impl Display for IMUData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IMUData {{ accel: [{:.4}, {:.4}, {:.4}], gyro: [{:.4}, {:.4}, {:.4}] }}",
            self.accel[0], self.accel[1], self.accel[2], self.gyro[0], self.gyro[1], self.gyro[2]
        )
    }
}
impl From<[f64; 6]> for IMUData {
    /// Builds an IMUData from `[accel_x, accel_y, accel_z, gyro_x, gyro_y, gyro_z]`.
    fn from(values: [f64; 6]) -> Self {
        IMUData {
            accel: Vector3::new(values[0], values[1], values[2]),
            gyro: Vector3::new(values[3], values[4], values[5]),
        }
    }
}
impl From<IMUData> for [f64; 6] {
    fn from(data: IMUData) -> Self {
        [
            data.accel[0],
            data.accel[1],
            data.accel[2],
            data.gyro[0],
            data.gyro[1],
            data.gyro[2],
        ]
    }
}
