//! Closed-form preintegration of consecutive IMU samples.
//!
//! [Preintegrator] accumulates, between two reference instants, the relative rotation $R$, the
//! velocity-contribution mean $\beta$ and the position-contribution mean $\alpha$, their first order
//! sensitivities to the gyroscope and accelerometer bias linearization points, and the covariance
//! of the 15-dimensional error state
//!
//! ```text
//! δx = [δθ, δb_g, δβ, δb_a, δα]
//! ```
//!
//! Each call to [Preintegrator::integrate_sample_interval] consumes one pair of consecutive
//! samples. The bias-compensated rate $\hat\omega$ and specific force $\hat a$ are held constant
//! over the step (or set to the average of both samples), which makes the mean and Jacobian
//! updates exact integrals rather than numerical approximations:
//!
//! $$
//! R_{k+1} = \exp(-[\hat\omega \Delta t]_\times) R_k
//! $$
//!
//! $$
//! \alpha_{k+1} = \alpha_k + \beta_k \Delta t + R_{k+1}^T \left( \tfrac{\Delta t^2}{2} I + f_1 [\hat\omega]_\times + f_2 [\hat\omega]_\times^2 \right) \hat a
//! $$
//!
//! $$
//! \beta_{k+1} = \beta_k + R_{k+1}^T \left( \Delta t I + f_3 [\hat\omega]_\times + f_4 [\hat\omega]_\times^2 \right) \hat a
//! $$
//!
//! The covariance obeys $\dot P = F P + P F^T + G Q_c G^T$, which is integrated with one RK4 step
//! per sample pair using the start, midpoint and end rotations of the step.

use log::{debug, trace};
use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::coefficients::AngleCoefficients;
use crate::config::PreintegrationConfig;
use crate::error::CpiError;
use crate::linalg::{rotation_to_quaternion, symmetrize, vector_to_skew_symmetric};
use crate::{IMUData, Matrix12, Matrix15, Matrix15x12};

/// Running preintegration summary for one interval.
///
/// Created once per interval with fixed bias linearization points and noise model, advanced with
/// [Preintegrator::integrate_sample_interval] in chronological order, read out, and discarded.
/// There is no reset; open a new one for the next interval.
#[derive(Clone, Debug, PartialEq)]
pub struct Preintegrator {
    elapsed_time: f64,
    relative_rotation: Matrix3<f64>,
    mean_alpha: Vector3<f64>,
    mean_beta: Vector3<f64>,
    jacobian_rotation_wrt_gyro_bias: Matrix3<f64>,
    jacobian_alpha_wrt_gyro_bias: Matrix3<f64>,
    jacobian_beta_wrt_gyro_bias: Matrix3<f64>,
    jacobian_alpha_wrt_accel_bias: Matrix3<f64>,
    jacobian_beta_wrt_accel_bias: Matrix3<f64>,
    covariance: Matrix15,
    linearization_gyro_bias: Vector3<f64>,
    linearization_accel_bias: Vector3<f64>,
    continuous_noise_covariance: Matrix12,
    average_samples: bool,
}

/// Snapshot of everything a host estimator reads at the end of an interval.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PreintegratedSummary {
    pub elapsed_time: f64,
    pub relative_rotation: Matrix3<f64>,
    pub relative_quaternion: UnitQuaternion<f64>,
    pub mean_alpha: Vector3<f64>,
    pub mean_beta: Vector3<f64>,
    pub jacobian_rotation_wrt_gyro_bias: Matrix3<f64>,
    pub jacobian_alpha_wrt_gyro_bias: Matrix3<f64>,
    pub jacobian_beta_wrt_gyro_bias: Matrix3<f64>,
    pub jacobian_alpha_wrt_accel_bias: Matrix3<f64>,
    pub jacobian_beta_wrt_accel_bias: Matrix3<f64>,
    pub covariance: Matrix15,
    pub linearization_gyro_bias: Vector3<f64>,
    pub linearization_accel_bias: Vector3<f64>,
}

/// Means re-evaluated at a new bias estimate through the first-order Jacobians.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BiasCorrectedMeans {
    pub relative_rotation: Matrix3<f64>,
    pub mean_alpha: Vector3<f64>,
    pub mean_beta: Vector3<f64>,
}

impl Preintegrator {
    /// Open a new interval.
    ///
    /// # Arguments
    /// * `gyro_bias` - gyroscope bias linearization point (rad/s)
    /// * `accel_bias` - accelerometer bias linearization point (m/s²)
    /// * `continuous_noise_covariance` - 12×12 `Q_c` over `[n_g, n_wg, n_a, n_wa]`
    /// * `average_samples` - use the mean of the start and end samples of each step instead of the start sample
    ///
    /// # Example
    /// ```rust
    /// use cpi::Preintegrator;
    /// use cpi::noise::IMUQuality;
    /// use nalgebra::Vector3;
    ///
    /// let noise = IMUQuality::Industrial.noise_parameters().continuous_covariance();
    /// let mut preintegrator = Preintegrator::new(Vector3::zeros(), Vector3::zeros(), noise, false);
    /// let w = Vector3::new(0.0, 0.0, 0.1);
    /// let a = Vector3::new(0.0, 0.0, 9.81);
    /// preintegrator.integrate_sample_interval(0.0, 0.01, &w, &a, &w, &a);
    /// assert!((preintegrator.elapsed_time() - 0.01).abs() < 1e-15);
    /// ```
    pub fn new(
        gyro_bias: Vector3<f64>,
        accel_bias: Vector3<f64>,
        continuous_noise_covariance: Matrix12,
        average_samples: bool,
    ) -> Preintegrator {
        debug!(
            "Opening preintegration interval: b_g = [{:.6}, {:.6}, {:.6}], b_a = [{:.6}, {:.6}, {:.6}], average_samples = {}",
            gyro_bias[0],
            gyro_bias[1],
            gyro_bias[2],
            accel_bias[0],
            accel_bias[1],
            accel_bias[2],
            average_samples
        );
        Preintegrator {
            elapsed_time: 0.0,
            relative_rotation: Matrix3::identity(),
            mean_alpha: Vector3::zeros(),
            mean_beta: Vector3::zeros(),
            jacobian_rotation_wrt_gyro_bias: Matrix3::zeros(),
            jacobian_alpha_wrt_gyro_bias: Matrix3::zeros(),
            jacobian_beta_wrt_gyro_bias: Matrix3::zeros(),
            jacobian_alpha_wrt_accel_bias: Matrix3::zeros(),
            jacobian_beta_wrt_accel_bias: Matrix3::zeros(),
            covariance: Matrix15::zeros(),
            linearization_gyro_bias: gyro_bias,
            linearization_accel_bias: accel_bias,
            continuous_noise_covariance,
            average_samples,
        }
    }
    /// Open a new interval from a validated configuration.
    pub fn from_config(config: &PreintegrationConfig) -> Result<Preintegrator, CpiError> {
        config.validate()?;
        Ok(Preintegrator::new(
            Vector3::from(config.gyro_bias),
            Vector3::from(config.accel_bias),
            config.noise.parameters().continuous_covariance(),
            config.average_samples,
        ))
    }
    /// Start from a non-identity rotation, e.g. when chaining onto a previous segment.
    pub fn with_initial_rotation(mut self, rotation: Matrix3<f64>) -> Preintegrator {
        self.relative_rotation = rotation;
        self
    }
    /// Integrate one pair of consecutive IMU samples.
    ///
    /// # Arguments
    /// * `t0`, `t1` - sample times in seconds, `t1 >= t0`
    /// * `w_m_0`, `a_m_0` - raw angular rate (rad/s) and specific force (m/s²) at `t0`
    /// * `w_m_1`, `a_m_1` - raw angular rate and specific force at `t1`
    ///
    /// A zero-length interval leaves the state untouched. Inputs are not validated: a negative
    /// interval or non-finite samples produce non-finite results rather than an error.
    pub fn integrate_sample_interval(
        &mut self,
        t0: f64,
        t1: f64,
        w_m_0: &Vector3<f64>,
        a_m_0: &Vector3<f64>,
        w_m_1: &Vector3<f64>,
        a_m_1: &Vector3<f64>,
    ) {
        let delta_t = t1 - t0;
        if delta_t == 0.0 {
            trace!("Skipping zero-length interval at t = {}", t0);
            return;
        }

        let mut w_hat = w_m_0 - self.linearization_gyro_bias;
        let mut a_hat = a_m_0 - self.linearization_accel_bias;
        if self.average_samples {
            w_hat = 0.5 * (w_hat + (w_m_1 - self.linearization_gyro_bias));
            a_hat = 0.5 * (a_hat + (a_m_1 - self.linearization_accel_bias));
        }

        let coefficients = AngleCoefficients::evaluate(w_hat.norm(), delta_t);
        let [f_1, f_2, f_3, f_4] = coefficients.f;
        let [d_1, d_2, d_3, d_4] = coefficients.df_dbias;

        let identity = Matrix3::<f64>::identity();
        let w_x = vector_to_skew_symmetric(&w_hat);
        let w_x_2 = w_x * w_x;
        let a_x = vector_to_skew_symmetric(&a_hat);
        let w_dt_x = vector_to_skew_symmetric(&(w_hat * delta_t));

        // ===== Means =====
        let increment = coefficients.rotation_increment(&w_x);
        let start_rotation = self.relative_rotation;
        let end_rotation = increment * start_rotation;
        let end_rotation_t = end_rotation.transpose();

        let alpha_arg = (delta_t.powi(2) / 2.0) * identity + f_1 * w_x + f_2 * w_x_2;
        let beta_arg = delta_t * identity + f_3 * w_x + f_4 * w_x_2;
        let h_alpha = end_rotation_t * alpha_arg;
        let h_beta = end_rotation_t * beta_arg;

        self.mean_alpha += self.mean_beta * delta_t + h_alpha * a_hat;
        self.mean_beta += h_beta * a_hat;

        // ===== Bias Jacobians =====
        let right_jacobian = coefficients.right_jacobian(&w_dt_x);
        self.jacobian_rotation_wrt_gyro_bias =
            increment * self.jacobian_rotation_wrt_gyro_bias + right_jacobian * delta_t;

        self.jacobian_alpha_wrt_accel_bias += self.jacobian_beta_wrt_accel_bias * delta_t - h_alpha;
        self.jacobian_beta_wrt_accel_bias -= h_beta;

        // Columns are taken w.r.t. one gyro bias component each. Both the end rotation
        // (through J_q) and the integral matrices (through ω̂ = ω_m - b_g) depend on it.
        let mut alpha_columns = Matrix3::<f64>::zeros();
        let mut beta_columns = Matrix3::<f64>::zeros();
        for i in 0..3 {
            let mut e_i = Vector3::<f64>::zeros();
            e_i[i] = 1.0;
            let e_i_x = vector_to_skew_symmetric(&e_i);
            let d_rotation_t = -end_rotation_t
                * vector_to_skew_symmetric(&(self.jacobian_rotation_wrt_gyro_bias * e_i));
            let d_w_x_2 = e_i_x * w_x + w_x * e_i_x;
            let d_alpha_arg =
                (w_hat[i] * d_1) * w_x - f_1 * e_i_x + (w_hat[i] * d_2) * w_x_2 - f_2 * d_w_x_2;
            let d_beta_arg =
                (w_hat[i] * d_3) * w_x - f_3 * e_i_x + (w_hat[i] * d_4) * w_x_2 - f_4 * d_w_x_2;
            alpha_columns.set_column(
                i,
                &((d_rotation_t * alpha_arg + end_rotation_t * d_alpha_arg) * a_hat),
            );
            beta_columns.set_column(
                i,
                &((d_rotation_t * beta_arg + end_rotation_t * d_beta_arg) * a_hat),
            );
        }
        self.jacobian_alpha_wrt_gyro_bias +=
            self.jacobian_beta_wrt_gyro_bias * delta_t + alpha_columns;
        self.jacobian_beta_wrt_gyro_bias += beta_columns;

        // ===== Covariance (RK4) =====
        // k2 and k3 share the midpoint rotation estimate
        let midpoint_rotation = coefficients.midpoint_increment(&w_x) * start_rotation;
        let f_start = error_state_jacobian(&w_x, &a_x, &start_rotation);
        let g_start = noise_jacobian(&start_rotation);
        let f_mid = error_state_jacobian(&w_x, &a_x, &midpoint_rotation);
        let g_mid = noise_jacobian(&midpoint_rotation);
        let f_end = error_state_jacobian(&w_x, &a_x, &end_rotation);
        let g_end = noise_jacobian(&end_rotation);

        let q_c = &self.continuous_noise_covariance;
        let p = self.covariance;
        let p_dot_k1 = covariance_rate(&f_start, &g_start, q_c, &p);
        let p_k2 = p + p_dot_k1 * (delta_t / 2.0);
        let p_dot_k2 = covariance_rate(&f_mid, &g_mid, q_c, &p_k2);
        let p_k3 = p + p_dot_k2 * (delta_t / 2.0);
        let p_dot_k3 = covariance_rate(&f_mid, &g_mid, q_c, &p_k3);
        let p_k4 = p + p_dot_k3 * delta_t;
        let p_dot_k4 = covariance_rate(&f_end, &g_end, q_c, &p_k4);

        let p_next =
            p + (delta_t / 6.0) * (p_dot_k1 + 2.0 * p_dot_k2 + 2.0 * p_dot_k3 + p_dot_k4);
        self.covariance = symmetrize(&p_next);

        self.relative_rotation = end_rotation;
        self.elapsed_time += delta_t;
        trace!(
            "Integrated [{:.6}, {:.6}] (small angle: {}), elapsed {:.6} s",
            t0, t1, coefficients.small_angle, self.elapsed_time
        );
    }
    /// [Preintegrator::integrate_sample_interval] for two [IMUData] samples.
    pub fn integrate(&mut self, t0: f64, t1: f64, start: &IMUData, end: &IMUData) {
        self.integrate_sample_interval(t0, t1, &start.gyro, &start.accel, &end.gyro, &end.accel);
    }
    /// Means re-evaluated at new bias estimates using the first-order Jacobians:
    ///
    /// $$
    /// R \approx \exp([J_q \delta b_g]_\times) R, \quad
    /// \alpha \approx \alpha + J_{\alpha,g} \delta b_g + J_{\alpha,a} \delta b_a, \quad
    /// \beta \approx \beta + J_{\beta,g} \delta b_g + J_{\beta,a} \delta b_a
    /// $$
    ///
    /// Only valid while the bias error stays small; the host decides when to open a fresh
    /// interval at the new linearization point instead.
    pub fn corrected_means(
        &self,
        gyro_bias: &Vector3<f64>,
        accel_bias: &Vector3<f64>,
    ) -> BiasCorrectedMeans {
        let delta_gyro = gyro_bias - self.linearization_gyro_bias;
        let delta_accel = accel_bias - self.linearization_accel_bias;
        let rotation_correction =
            Rotation3::from_scaled_axis(self.jacobian_rotation_wrt_gyro_bias * delta_gyro);
        BiasCorrectedMeans {
            relative_rotation: rotation_correction.matrix() * self.relative_rotation,
            mean_alpha: self.mean_alpha
                + self.jacobian_alpha_wrt_gyro_bias * delta_gyro
                + self.jacobian_alpha_wrt_accel_bias * delta_accel,
            mean_beta: self.mean_beta
                + self.jacobian_beta_wrt_gyro_bias * delta_gyro
                + self.jacobian_beta_wrt_accel_bias * delta_accel,
        }
    }
    pub fn summary(&self) -> PreintegratedSummary {
        PreintegratedSummary {
            elapsed_time: self.elapsed_time,
            relative_rotation: self.relative_rotation,
            relative_quaternion: self.relative_quaternion(),
            mean_alpha: self.mean_alpha,
            mean_beta: self.mean_beta,
            jacobian_rotation_wrt_gyro_bias: self.jacobian_rotation_wrt_gyro_bias,
            jacobian_alpha_wrt_gyro_bias: self.jacobian_alpha_wrt_gyro_bias,
            jacobian_beta_wrt_gyro_bias: self.jacobian_beta_wrt_gyro_bias,
            jacobian_alpha_wrt_accel_bias: self.jacobian_alpha_wrt_accel_bias,
            jacobian_beta_wrt_accel_bias: self.jacobian_beta_wrt_accel_bias,
            covariance: self.covariance,
            linearization_gyro_bias: self.linearization_gyro_bias,
            linearization_accel_bias: self.linearization_accel_bias,
        }
    }
    /// Total time covered since the interval was opened (s)
    pub fn elapsed_time(&self) -> f64 {
        self.elapsed_time
    }
    /// Rotation from the interval-start frame to the current IMU frame
    pub fn relative_rotation(&self) -> &Matrix3<f64> {
        &self.relative_rotation
    }
    pub fn relative_quaternion(&self) -> UnitQuaternion<f64> {
        rotation_to_quaternion(&self.relative_rotation)
    }
    /// Preintegrated position contribution, in the interval-start frame
    pub fn mean_alpha(&self) -> &Vector3<f64> {
        &self.mean_alpha
    }
    /// Preintegrated velocity contribution, in the interval-start frame
    pub fn mean_beta(&self) -> &Vector3<f64> {
        &self.mean_beta
    }
    pub fn jacobian_rotation_wrt_gyro_bias(&self) -> &Matrix3<f64> {
        &self.jacobian_rotation_wrt_gyro_bias
    }
    pub fn jacobian_alpha_wrt_gyro_bias(&self) -> &Matrix3<f64> {
        &self.jacobian_alpha_wrt_gyro_bias
    }
    pub fn jacobian_beta_wrt_gyro_bias(&self) -> &Matrix3<f64> {
        &self.jacobian_beta_wrt_gyro_bias
    }
    pub fn jacobian_alpha_wrt_accel_bias(&self) -> &Matrix3<f64> {
        &self.jacobian_alpha_wrt_accel_bias
    }
    pub fn jacobian_beta_wrt_accel_bias(&self) -> &Matrix3<f64> {
        &self.jacobian_beta_wrt_accel_bias
    }
    /// Error-state covariance over `[δθ, δb_g, δβ, δb_a, δα]`
    pub fn covariance(&self) -> &Matrix15 {
        &self.covariance
    }
    pub fn linearization_gyro_bias(&self) -> &Vector3<f64> {
        &self.linearization_gyro_bias
    }
    pub fn linearization_accel_bias(&self) -> &Vector3<f64> {
        &self.linearization_accel_bias
    }
    pub fn continuous_noise_covariance(&self) -> &Matrix12 {
        &self.continuous_noise_covariance
    }
    pub fn average_samples(&self) -> bool {
        self.average_samples
    }
}

/// Continuous error-state transition matrix F at one rotation estimate.
///
/// ```text
///          δθ        δb_g   δβ   δb_a   δα
/// δθ   [ -[ω]×      -I     0    0      0 ]
/// δb_g [  0          0     0    0      0 ]
/// δβ   [ -Rᵀ[a]×     0     0   -Rᵀ     0 ]
/// δb_a [  0          0     0    0      0 ]
/// δα   [  0          0     I    0      0 ]
/// ```
pub fn error_state_jacobian(
    w_x: &Matrix3<f64>,
    a_x: &Matrix3<f64>,
    rotation: &Matrix3<f64>,
) -> Matrix15 {
    let rotation_t = rotation.transpose();
    let identity = Matrix3::<f64>::identity();
    let mut f = Matrix15::zeros();
    f.fixed_view_mut::<3, 3>(0, 0).copy_from(&(-w_x));
    f.fixed_view_mut::<3, 3>(0, 3).copy_from(&(-identity));
    f.fixed_view_mut::<3, 3>(6, 0)
        .copy_from(&(-rotation_t * a_x));
    f.fixed_view_mut::<3, 3>(6, 9).copy_from(&(-rotation_t));
    f.fixed_view_mut::<3, 3>(12, 6).copy_from(&identity);
    f
}

/// Noise injection matrix G at one rotation estimate, mapping `[n_g, n_wg, n_a, n_wa]` onto
/// the error state.
pub fn noise_jacobian(rotation: &Matrix3<f64>) -> Matrix15x12 {
    let identity = Matrix3::<f64>::identity();
    let mut g = Matrix15x12::zeros();
    g.fixed_view_mut::<3, 3>(0, 0).copy_from(&(-identity));
    g.fixed_view_mut::<3, 3>(3, 3).copy_from(&identity);
    g.fixed_view_mut::<3, 3>(6, 6)
        .copy_from(&(-rotation.transpose()));
    g.fixed_view_mut::<3, 3>(9, 9).copy_from(&identity);
    g
}

/// $\dot P = F P + P F^T + G Q_c G^T$
fn covariance_rate(f: &Matrix15, g: &Matrix15x12, q_c: &Matrix12, p: &Matrix15) -> Matrix15 {
    f * p + p * f.transpose() + g * q_c * g.transpose()
}
