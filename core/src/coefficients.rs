//! Trigonometric coefficients of the closed-form preintegration equations.
//!
//! Every place the integration divides by the rotation rate magnitude `|ω|` is collected here
//! as a scalar coefficient. For a step of length `Δt` at rate `|ω|` (angle `θ = |ω|Δt`):
//!
//! | Coefficient | General form | Small-angle form |
//! |---|---|---|
//! | rotation sin term | $\sin\theta / \lvert\omega\rvert$ | $\Delta t$ |
//! | rotation cos term | $(1-\cos\theta) / \lvert\omega\rvert^2$ | $\Delta t^2 / 2$ |
//! | right Jacobian, first order | $(1-\cos\theta) / \theta^2$ | $1/2$ |
//! | right Jacobian, second order | $(\theta-\sin\theta) / \theta^3$ | $1/6$ |
//! | $f_1$ | $(\theta\cos\theta-\sin\theta) / \lvert\omega\rvert^3$ | $-\Delta t^3/3$ |
//! | $f_2$ | $(\theta^2-2\cos\theta-2\theta\sin\theta+2) / (2\lvert\omega\rvert^4)$ | $\Delta t^4/8$ |
//! | $f_3$ | $-(1-\cos\theta) / \lvert\omega\rvert^2$ | $-\Delta t^2/2$ |
//! | $f_4$ | $(\theta-\sin\theta) / \lvert\omega\rvert^3$ | $\Delta t^3/6$ |
//!
//! so that the rotation increment is $\exp(-[\omega\Delta t]_\times) = I - s[\omega]_\times + c[\omega]_\times^2$
//! and the velocity/position integral matrices are $\Delta t I + f_3[\omega]_\times + f_4[\omega]_\times^2$ and
//! $\tfrac{\Delta t^2}{2} I + f_1[\omega]_\times + f_2[\omega]_\times^2$.
//!
//! Below [SMALL_ANGLE_THRESHOLD] the general forms lose all precision to cancellation and the
//! leading terms of their Taylor expansions are used instead. The branch is chosen once per
//! step in [AngleCoefficients::evaluate].

use nalgebra::Matrix3;

/// Rotation rate (rad/s, ≈0.5°/s) below which the Taylor forms are used.
pub const SMALL_ANGLE_THRESHOLD: f64 = 0.008726646;

/// All rate-dependent scalars needed by one integration step.
///
/// The gyro-bias derivative of each integral coefficient is separable: with the bias-compensated
/// rate $\hat\omega = \omega_m - b_g$,
///
/// $$
/// \frac{\partial f_i}{\partial b_{g,j}} = \hat\omega_j \, d_i
/// $$
///
/// and `df_dbias[i]` stores $d_i$.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AngleCoefficients {
    /// Whether the Taylor forms were used
    pub small_angle: bool,
    /// Coefficient of $-[\omega]_\times$ in the rotation increment
    pub rotation_sin: f64,
    /// Coefficient of $[\omega]_\times^2$ in the rotation increment
    pub rotation_cos: f64,
    /// Coefficient of $-[\omega]_\times$ in the half-step rotation increment
    pub midpoint_sin: f64,
    /// Coefficient of $[\omega]_\times^2$ in the half-step rotation increment
    pub midpoint_cos: f64,
    /// Coefficient of $-[\omega\Delta t]_\times$ in the right Jacobian
    pub right_jacobian_first: f64,
    /// Coefficient of $[\omega\Delta t]_\times^2$ in the right Jacobian
    pub right_jacobian_second: f64,
    /// Integral coefficients $f_1 \dots f_4$
    pub f: [f64; 4],
    /// Gyro-bias derivative magnitudes $d_1 \dots d_4$
    pub df_dbias: [f64; 4],
}

impl AngleCoefficients {
    /// Evaluate the coefficients for a step of `delta_t` seconds at rotation rate magnitude
    /// `rate`, selecting the small-angle branch when `rate < SMALL_ANGLE_THRESHOLD`.
    pub fn evaluate(rate: f64, delta_t: f64) -> Self {
        if rate < SMALL_ANGLE_THRESHOLD {
            Self::small_angle(delta_t)
        } else {
            Self::general(rate, delta_t)
        }
    }
    /// Leading Taylor terms of every coefficient. Independent of the rate itself.
    pub fn small_angle(delta_t: f64) -> Self {
        let half_dt = 0.5 * delta_t;
        AngleCoefficients {
            small_angle: true,
            rotation_sin: delta_t,
            rotation_cos: delta_t.powi(2) / 2.0,
            midpoint_sin: half_dt,
            midpoint_cos: half_dt.powi(2) / 2.0,
            right_jacobian_first: 0.5,
            right_jacobian_second: 1.0 / 6.0,
            f: [
                -delta_t.powi(3) / 3.0,
                delta_t.powi(4) / 8.0,
                -delta_t.powi(2) / 2.0,
                delta_t.powi(3) / 6.0,
            ],
            df_dbias: [
                -delta_t.powi(5) / 15.0,
                delta_t.powi(6) / 72.0,
                -delta_t.powi(4) / 12.0,
                delta_t.powi(5) / 60.0,
            ],
        }
    }
    /// Exact trigonometric forms. `rate` must be non-zero.
    pub fn general(rate: f64, delta_t: f64) -> Self {
        let angle = rate * delta_t;
        let (sin_wt, cos_wt) = angle.sin_cos();
        let (sin_half, cos_half) = (0.5 * angle).sin_cos();
        AngleCoefficients {
            small_angle: false,
            rotation_sin: sin_wt / rate,
            rotation_cos: (1.0 - cos_wt) / rate.powi(2),
            midpoint_sin: sin_half / rate,
            midpoint_cos: (1.0 - cos_half) / rate.powi(2),
            right_jacobian_first: (1.0 - cos_wt) / angle.powi(2),
            right_jacobian_second: (angle - sin_wt) / angle.powi(3),
            f: [
                (angle * cos_wt - sin_wt) / rate.powi(3),
                (angle.powi(2) - 2.0 * cos_wt - 2.0 * angle * sin_wt + 2.0) / (2.0 * rate.powi(4)),
                -(1.0 - cos_wt) / rate.powi(2),
                (angle - sin_wt) / rate.powi(3),
            ],
            df_dbias: [
                (angle.powi(2) * sin_wt - 3.0 * sin_wt + 3.0 * angle * cos_wt) / rate.powi(5),
                (angle.powi(2) - 4.0 * cos_wt - 4.0 * angle * sin_wt + angle.powi(2) * cos_wt + 4.0)
                    / rate.powi(6),
                (2.0 * (cos_wt - 1.0) + angle * sin_wt) / rate.powi(4),
                (2.0 * angle + angle * cos_wt - 3.0 * sin_wt) / rate.powi(5),
            ],
        }
    }
    /// Rotation increment $\exp(-[\omega\Delta t]_\times)$ given $[\omega]_\times$.
    pub fn rotation_increment(&self, rate_skew: &Matrix3<f64>) -> Matrix3<f64> {
        Matrix3::identity() - self.rotation_sin * rate_skew
            + self.rotation_cos * (rate_skew * rate_skew)
    }
    /// Half-step rotation increment $\exp(-[\omega\Delta t/2]_\times)$ given $[\omega]_\times$.
    pub fn midpoint_increment(&self, rate_skew: &Matrix3<f64>) -> Matrix3<f64> {
        Matrix3::identity() - self.midpoint_sin * rate_skew
            + self.midpoint_cos * (rate_skew * rate_skew)
    }
    /// Right Jacobian of SO(3) given $[\omega\Delta t]_\times$.
    pub fn right_jacobian(&self, angle_skew: &Matrix3<f64>) -> Matrix3<f64> {
        Matrix3::identity() - self.right_jacobian_first * angle_skew
            + self.right_jacobian_second * (angle_skew * angle_skew)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::vector_to_skew_symmetric;
    use assert_approx_eq::assert_approx_eq;
    use nalgebra::{Rotation3, Vector3};

    /// Every scalar in a fixed order
    fn as_array(c: &AngleCoefficients) -> [f64; 14] {
        [
            c.rotation_sin,
            c.rotation_cos,
            c.midpoint_sin,
            c.midpoint_cos,
            c.right_jacobian_first,
            c.right_jacobian_second,
            c.f[0],
            c.f[1],
            c.f[2],
            c.f[3],
            c.df_dbias[0],
            c.df_dbias[1],
            c.df_dbias[2],
            c.df_dbias[3],
        ]
    }

    fn max_relative_difference(a: &AngleCoefficients, b: &AngleCoefficients) -> f64 {
        as_array(a)
            .iter()
            .zip(as_array(b).iter())
            .map(|(x, y)| (x - y).abs() / y.abs())
            .fold(0.0, f64::max)
    }

    #[test]
    fn branch_selection() {
        assert!(AngleCoefficients::evaluate(0.0, 0.01).small_angle);
        assert!(AngleCoefficients::evaluate(0.5 * SMALL_ANGLE_THRESHOLD, 0.01).small_angle);
        assert!(!AngleCoefficients::evaluate(SMALL_ANGLE_THRESHOLD, 0.01).small_angle);
        assert!(!AngleCoefficients::evaluate(1.0, 0.01).small_angle);
    }

    #[test]
    fn branches_converge_across_threshold() {
        // A long step keeps the general forms well clear of cancellation so the
        // remaining difference is the Taylor truncation, which is O(θ²).
        let delta_t = 10.0;
        let mut differences = Vec::new();
        for scale in [8.0, 4.0, 2.0, 1.0, 0.5] {
            let rate = scale * SMALL_ANGLE_THRESHOLD;
            let angle = rate * delta_t;
            let small = AngleCoefficients::small_angle(delta_t);
            let general = AngleCoefficients::general(rate, delta_t);
            let difference = max_relative_difference(&small, &general);
            assert!(
                difference < angle.powi(2),
                "relative difference {} too large at θ = {}",
                difference,
                angle
            );
            differences.push(difference);
        }
        assert!(differences[4] < differences[0] / 10.0);
    }

    #[test]
    fn branches_agree_at_imu_step_lengths() {
        // At Δt = 5 ms just above the threshold the general f_2 and d_2..d_4 are mostly
        // rounding error. Each coefficient only enters a step multiplied by the matching
        // power of |ω| (one more for the d_i through ŵ_j), so compare those products.
        let delta_t = 0.005;
        for scale in [1.01, 1.5, 2.0] {
            let rate: f64 = scale * SMALL_ANGLE_THRESHOLD;
            let angle = rate * delta_t;
            let small = AngleCoefficients::small_angle(delta_t);
            let general = AngleCoefficients::general(rate, delta_t);
            let weighted = |c: &AngleCoefficients| {
                [
                    c.rotation_sin * rate,
                    c.rotation_cos * rate.powi(2),
                    c.midpoint_sin * rate,
                    c.midpoint_cos * rate.powi(2),
                    c.right_jacobian_first * angle,
                    c.right_jacobian_second * angle.powi(2),
                    c.f[0] * rate,
                    c.f[1] * rate.powi(2),
                    c.f[2] * rate,
                    c.f[3] * rate.powi(2),
                    c.df_dbias[0] * rate.powi(2),
                    c.df_dbias[1] * rate.powi(3),
                    c.df_dbias[2] * rate.powi(2),
                    c.df_dbias[3] * rate.powi(3),
                ]
            };
            let small = weighted(&small);
            let general = weighted(&general);
            for i in 0..10 {
                assert!(
                    (small[i] - general[i]).abs() < 1e-10,
                    "term {} differs by {:e} at |ω| = {}",
                    i,
                    (small[i] - general[i]).abs(),
                    rate
                );
            }
            // bias derivatives, per unit of specific force
            for i in 10..14 {
                assert!(
                    (small[i] - general[i]).abs() < 1e-7,
                    "term {} differs by {:e} at |ω| = {}",
                    i,
                    (small[i] - general[i]).abs(),
                    rate
                );
            }
        }
    }

    #[test]
    fn small_angle_limits() {
        let delta_t = 0.01;
        let small = AngleCoefficients::small_angle(delta_t);
        assert_approx_eq!(small.rotation_sin, delta_t);
        assert_approx_eq!(small.rotation_cos, 5e-5);
        assert_approx_eq!(small.midpoint_sin, 0.005);
        assert_approx_eq!(small.f[2], -5e-5);
        let increment = small.rotation_increment(&Matrix3::zeros());
        assert_eq!(increment, Matrix3::identity());
    }

    #[test]
    fn rotation_increment_about_z() {
        let rate = Vector3::new(0.0, 0.0, 0.1);
        let delta_t = 0.01;
        let coefficients = AngleCoefficients::evaluate(rate.norm(), delta_t);
        let increment = coefficients.rotation_increment(&vector_to_skew_symmetric(&rate));
        let angle: f64 = 0.001;
        assert_approx_eq!(increment[(0, 0)], angle.cos(), 1e-15);
        assert_approx_eq!(increment[(0, 1)], angle.sin(), 1e-15);
        assert_approx_eq!(increment[(1, 0)], -angle.sin(), 1e-15);
        assert_approx_eq!(increment[(1, 1)], angle.cos(), 1e-15);
        assert_approx_eq!(increment[(2, 2)], 1.0, 1e-15);
    }

    #[test]
    fn rotation_increment_matches_exponential() {
        let rate = Vector3::new(0.4, -1.1, 0.7);
        let delta_t = 0.05;
        let coefficients = AngleCoefficients::evaluate(rate.norm(), delta_t);
        let skew = vector_to_skew_symmetric(&rate);
        let expected = Rotation3::from_scaled_axis(-rate * delta_t);
        let increment = coefficients.rotation_increment(&skew);
        assert!((increment - expected.matrix()).abs().max() < 1e-14);
        let expected_half = Rotation3::from_scaled_axis(-rate * 0.5 * delta_t);
        let midpoint = coefficients.midpoint_increment(&skew);
        assert!((midpoint - expected_half.matrix()).abs().max() < 1e-14);
        // Two half steps make a full step
        assert!((midpoint * midpoint - increment).abs().max() < 1e-14);
    }

    #[test]
    fn right_jacobian_maps_perturbations() {
        // Exp(φ + δ) ≈ Exp(φ) Exp(J_r(φ) δ)
        let phi = Vector3::new(0.2, 0.1, -0.3);
        let delta = Vector3::new(1e-6, -2e-6, 1.5e-6);
        let coefficients = AngleCoefficients::general(phi.norm(), 1.0);
        let jr = coefficients.right_jacobian(&vector_to_skew_symmetric(&phi));
        let lhs = Rotation3::from_scaled_axis(phi + delta);
        let rhs = Rotation3::from_scaled_axis(phi) * Rotation3::from_scaled_axis(jr * delta);
        assert!((lhs.matrix() - rhs.matrix()).abs().max() < 1e-11);
    }

    #[test]
    fn bias_derivatives_match_finite_differences() {
        // f_i as a function of the rate vector; bias enters as ω - b
        let delta_t = 0.2;
        let rate = Vector3::new(0.8, -0.3, 0.5);
        let coefficients = AngleCoefficients::general(rate.norm(), delta_t);
        let epsilon = 1e-6;
        for j in 0..3 {
            let mut plus = rate;
            plus[j] -= epsilon;
            let mut minus = rate;
            minus[j] += epsilon;
            let f_plus = AngleCoefficients::general(plus.norm(), delta_t).f;
            let f_minus = AngleCoefficients::general(minus.norm(), delta_t).f;
            for i in 0..4 {
                let numeric = (f_plus[i] - f_minus[i]) / (2.0 * epsilon);
                let analytic = rate[j] * coefficients.df_dbias[i];
                assert!(
                    (numeric - analytic).abs() < 1e-9,
                    "df_{}/db_{}: numeric {:e}, analytic {:e}",
                    i + 1,
                    j + 1,
                    numeric,
                    analytic
                );
            }
        }
    }
}
