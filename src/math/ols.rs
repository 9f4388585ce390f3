//! Linear least squares helpers used inside the damped Gauss-Newton steps.
//!
//! The Levenberg-Marquardt loop normally solves its normal equations with a
//! Cholesky factorization. When the damped matrix is not positive definite
//! (flat directions, a parameter with no influence on the residuals) we fall
//! back to an SVD solve, and the covariance at the optimum uses the
//! Moore-Penrose pseudo-inverse for the same reason.
//!
//! Parameter counts are tiny (4 to 10 columns), so SVD cost is negligible.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly or
/// holds non-finite entries.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    if !x.iter().chain(y.iter()).all(|v| v.is_finite()) {
        return None;
    }
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Moore-Penrose pseudo-inverse with singular values below
/// `rcond · σ_max` treated as zero.
pub fn pseudo_inverse(matrix: &DMatrix<f64>, rcond: f64) -> Option<DMatrix<f64>> {
    if !matrix.iter().all(|v| v.is_finite()) {
        return None;
    }
    let svd = matrix.clone().svd(true, true);
    let sigma_max = svd.singular_values.iter().copied().fold(0.0, f64::max);
    if !sigma_max.is_finite() {
        return None;
    }
    let eps = (rcond * sigma_max).max(f64::MIN_POSITIVE);
    svd.pseudo_inverse(eps)
        .ok()
        .filter(|inv| inv.iter().all(|v| v.is_finite()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn pseudo_inverse_matches_inverse_for_regular_matrix() {
        let m = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
        let inv = pseudo_inverse(&m, 1e-12).unwrap();
        let id = &m * &inv;
        assert!((id[(0, 0)] - 1.0).abs() < 1e-12);
        assert!(id[(0, 1)].abs() < 1e-12);
    }

    #[test]
    fn pseudo_inverse_handles_singular_matrix() {
        // Rank one: only the first direction carries information.
        let m = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 0.0]);
        let inv = pseudo_inverse(&m, 1e-12).unwrap();
        assert!((inv[(0, 0)] - 0.5).abs() < 1e-12);
        assert_eq!(inv[(1, 1)], 0.0);
    }

    #[test]
    fn non_finite_systems_are_rejected() {
        let m = DMatrix::from_row_slice(2, 2, &[f64::INFINITY, 1.0, 1.0, f64::NEG_INFINITY]);
        let y = DVector::from_row_slice(&[1.0, 2.0]);
        assert!(solve_least_squares(&m, &y).is_none());
        assert!(pseudo_inverse(&m, 1e-12).is_none());

        let m = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let y = DVector::from_row_slice(&[f64::NAN, 2.0]);
        assert!(solve_least_squares(&m, &y).is_none());
    }
}
