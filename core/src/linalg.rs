//! Small fixed-size linear algebra helpers shared by the preintegrator.
//!
//! Public API:
//!     pub fn vector_to_skew_symmetric(v: &Vector3<f64>) -> Matrix3<f64>
//!     pub fn skew_symmetric_to_vector(skew: &Matrix3<f64>) -> Vector3<f64>
//!     pub fn symmetrize<const N: usize>(m: &SMatrix<f64, N, N>) -> SMatrix<f64, N, N>
//!     pub fn rotation_to_quaternion(rotation: &Matrix3<f64>) -> UnitQuaternion<f64>
//!
//! Everything here operates on stack-allocated `nalgebra` types so that the per-sample
//! integration path never touches the heap.

use nalgebra::{Matrix3, Rotation3, SMatrix, UnitQuaternion, Vector3};

/// Convert a three-element vector to its skew-symmetric (cross product) matrix
///
/// $$
/// x = \begin{bmatrix} a \\\\ b \\\\ c \end{bmatrix} \rightarrow X = \begin{bmatrix} 0 & -c & b \\\\ c & 0 & -a \\\\ -b & a & 0 \end{bmatrix}
/// $$
///
/// such that `X * y == x.cross(&y)`.
///
/// # Example
/// ```rust
/// use cpi::linalg::vector_to_skew_symmetric;
/// use nalgebra::Vector3;
/// let x = Vector3::new(1.0, 2.0, 3.0);
/// let y = Vector3::new(-4.0, 0.5, 2.0);
/// assert_eq!(vector_to_skew_symmetric(&x) * y, x.cross(&y));
/// ```
pub fn vector_to_skew_symmetric(v: &Vector3<f64>) -> Matrix3<f64> {
    let mut skew: Matrix3<f64> = Matrix3::zeros();
    skew[(0, 1)] = -v[2];
    skew[(0, 2)] = v[1];
    skew[(1, 0)] = v[2];
    skew[(1, 2)] = -v[0];
    skew[(2, 0)] = -v[1];
    skew[(2, 1)] = v[0];
    skew
}
/// Convert a skew-symmetric matrix back to its three-element vector
///
/// Inverse of [vector_to_skew_symmetric]. Only the lower triangle is read, so
/// an input that is not exactly skew-symmetric is not averaged.
pub fn skew_symmetric_to_vector(skew: &Matrix3<f64>) -> Vector3<f64> {
    Vector3::new(skew[(2, 1)], skew[(0, 2)], skew[(1, 0)])
}
/// Symmetrize a square matrix: P ← 0.5 (P + Pᵀ)
///
/// Floating point addition is commutative, so the result is exactly symmetric
/// regardless of the asymmetry in the input.
///
/// # Arguments
/// * `m` - the matrix to symmetrize
///
/// # Returns
/// A symmetrized copy of the input matrix.
#[inline]
pub fn symmetrize<const N: usize>(m: &SMatrix<f64, N, N>) -> SMatrix<f64, N, N> {
    0.5 * (m + m.transpose())
}
/// Unit quaternion of a rotation matrix.
///
/// The matrix is assumed orthonormal; no re-orthonormalization is performed.
pub fn rotation_to_quaternion(rotation: &Matrix3<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(*rotation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn t_skew_layout() {
        let v = Vector3::new(1.0, 2.0, 3.0);
        let skew = vector_to_skew_symmetric(&v);
        assert_eq!(skew[(0, 1)], -v[2]);
        assert_eq!(skew[(0, 2)], v[1]);
        assert_eq!(skew[(1, 0)], v[2]);
        assert_eq!(skew[(1, 2)], -v[0]);
        assert_eq!(skew[(2, 0)], -v[1]);
        assert_eq!(skew[(2, 1)], v[0]);
        assert_eq!(skew, -skew.transpose());
    }
    #[test]
    fn t_skew_inverse() {
        let v = Vector3::new(-0.3, 7.0, 1.25);
        assert_eq!(skew_symmetric_to_vector(&vector_to_skew_symmetric(&v)), v);
    }
    #[test]
    fn t_skew_is_cross_product() {
        let a = Vector3::new(0.2, -1.0, 4.0);
        let b = Vector3::new(3.0, 0.1, -2.0);
        let lhs = vector_to_skew_symmetric(&a) * b;
        let rhs = a.cross(&b);
        for i in 0..3 {
            assert_approx_eq!(lhs[i], rhs[i], 1e-15);
        }
    }
    #[test]
    fn t_symmetrize_exact() {
        let mut m = SMatrix::<f64, 4, 4>::zeros();
        for i in 0..4 {
            for j in 0..4 {
                m[(i, j)] = (i as f64 + 1.0) / 3.0 + 0.1 * j as f64 + 1e-13 * (i * j) as f64;
            }
        }
        m[(0, 3)] += 1e-9;
        let s = symmetrize(&m);
        assert_eq!(s, s.transpose());
        assert_approx_eq!(s[(0, 3)], 0.5 * (m[(0, 3)] + m[(3, 0)]), 1e-15);
    }
    #[test]
    fn t_quaternion_matches_rotation() {
        let rotation = Rotation3::from_scaled_axis(Vector3::new(0.1, -0.4, 0.25));
        let q = rotation_to_quaternion(rotation.matrix());
        let back = q.to_rotation_matrix();
        assert!((back.matrix() - rotation.matrix()).abs().max() < 1e-12);
    }
}
