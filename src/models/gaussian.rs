//! Gaussian PSF models in one, two and three dimensions.
//!
//! All models share the form `bg + amp * exp(-½ dᵀ C⁻¹ d)` where `d` is the
//! offset from the centre. The covariance is parameterised by its upper
//! triangle (`[cyy, cyx, cxx]` in 2D, `[czz, czy, czx, cyy, cyx, cxx]` in
//! 3D) and inverted in closed form, so a solver may wander through indefinite
//! matrices without the evaluation branching on sign.

use nalgebra::{Matrix2, Matrix3};

/// `2 * sqrt(2 ln 2)`: FWHM of a Gaussian with unit sigma.
pub const FWHM_FACTOR: f64 = 2.354_820_045_030_949;

pub fn fwhm(sigma: f64) -> f64 {
    sigma * FWHM_FACTOR
}

pub fn evaluate_1d_gaussian(z: f64, bg: f64, amp: f64, mu: f64, sigma: f64) -> f64 {
    let d = (z - mu) / sigma;
    bg + amp * (-0.5 * d * d).exp()
}

pub fn evaluate_2d_gaussian(yx: [f64; 2], bg: f64, amp: f64, mu: [f64; 2], cov: [f64; 3]) -> f64 {
    let [a, b, d] = cov;
    let dy = yx[0] - mu[0];
    let dx = yx[1] - mu[1];
    let det = a * d - b * b;
    let q = (d * dy * dy - 2.0 * b * dy * dx + a * dx * dx) / det;
    bg + amp * (-0.5 * q).exp()
}

pub fn evaluate_3d_gaussian(zyx: [f64; 3], bg: f64, amp: f64, mu: [f64; 3], cov: [f64; 6]) -> f64 {
    let [a, b, c, d, e, f] = cov;
    let dz = zyx[0] - mu[0];
    let dy = zyx[1] - mu[1];
    let dx = zyx[2] - mu[2];

    // Cofactors of the symmetric matrix [[a b c] [b d e] [c e f]].
    let ca = d * f - e * e;
    let cb = c * e - b * f;
    let cc = b * e - c * d;
    let cd = a * f - c * c;
    let ce = b * c - a * e;
    let cf = a * d - b * b;
    let det = a * ca + b * cb + c * cc;

    let q = (ca * dz * dz
        + cd * dy * dy
        + cf * dx * dx
        + 2.0 * cb * dz * dy
        + 2.0 * cc * dz * dx
        + 2.0 * ce * dy * dx)
        / det;
    bg + amp * (-0.5 * q).exp()
}

/// `[bg, amp, mu, sigma]`
pub fn gaussian_1d(z: f64, params: &[f64]) -> f64 {
    evaluate_1d_gaussian(z, params[0], params[1], params[2], params[3])
}

/// `[bg, amp, mu_y, mu_x, cyy, cyx, cxx]`
pub fn gaussian_2d(yx: [f64; 2], params: &[f64]) -> f64 {
    evaluate_2d_gaussian(
        yx,
        params[0],
        params[1],
        [params[2], params[3]],
        [params[4], params[5], params[6]],
    )
}

/// `[bg, amp, mu_z, mu_y, mu_x, czz, czy, czx, cyy, cyx, cxx]`
pub fn gaussian_3d(zyx: [f64; 3], params: &[f64]) -> f64 {
    evaluate_3d_gaussian(
        zyx,
        params[0],
        params[1],
        [params[2], params[3], params[4]],
        [params[5], params[6], params[7], params[8], params[9], params[10]],
    )
}

/// Principal sigmas of a 2D covariance, largest first.
pub fn principal_sigmas_2d(cov: [f64; 3]) -> [f64; 2] {
    let [a, b, d] = cov;
    let eig = Matrix2::new(a, b, b, d).symmetric_eigen();
    let mut out = [eig.eigenvalues[0].abs().sqrt(), eig.eigenvalues[1].abs().sqrt()];
    out.sort_by(|x, y| y.total_cmp(x));
    out
}

/// Principal sigmas of a 3D covariance, largest first.
pub fn principal_sigmas_3d(cov: [f64; 6]) -> [f64; 3] {
    let [a, b, c, d, e, f] = cov;
    let eig = Matrix3::new(a, b, c, b, d, e, c, e, f).symmetric_eigen();
    let mut out = [0.0; 3];
    for (slot, value) in out.iter_mut().zip(eig.eigenvalues.iter()) {
        *slot = value.abs().sqrt();
    }
    out.sort_by(|x, y| y.total_cmp(x));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fwhm_factor_is_two_sqrt_two_ln_two() {
        let expected = 2.0 * (2.0 * std::f64::consts::LN_2).sqrt();
        assert!((FWHM_FACTOR - expected).abs() < 1e-15);
        for sigma in [0.5, 1.0, 213.0] {
            assert!((fwhm(sigma) / sigma - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn one_d_gaussian_is_half_max_at_half_fwhm() {
        let sigma = 200.0;
        let half = fwhm(sigma) / 2.0;
        let v = evaluate_1d_gaussian(1000.0 + half, 100.0, 800.0, 1000.0, sigma);
        assert!((v - 500.0).abs() < 1e-9);
        assert_eq!(evaluate_1d_gaussian(1000.0, 100.0, 800.0, 1000.0, sigma), 900.0);
    }

    #[test]
    fn axis_aligned_models_factorise() {
        let (sz, sy, sx) = (3.0, 2.0, 1.5);
        let p = [1.0, -2.0, 0.5];
        let v3 = evaluate_3d_gaussian(p, 0.0, 1.0, [0.0; 3], [sz * sz, 0.0, 0.0, sy * sy, 0.0, sx * sx]);
        let expected = evaluate_1d_gaussian(p[0], 0.0, 1.0, 0.0, sz)
            * evaluate_1d_gaussian(p[1], 0.0, 1.0, 0.0, sy)
            * evaluate_1d_gaussian(p[2], 0.0, 1.0, 0.0, sx);
        assert!((v3 - expected).abs() < 1e-14);

        let v2 = evaluate_2d_gaussian([p[1], p[2]], 0.0, 1.0, [0.0; 2], [sy * sy, 0.0, sx * sx]);
        let expected = evaluate_1d_gaussian(p[1], 0.0, 1.0, 0.0, sy) * evaluate_1d_gaussian(p[2], 0.0, 1.0, 0.0, sx);
        assert!((v2 - expected).abs() < 1e-14);
    }

    #[test]
    fn three_d_inverse_matches_nalgebra() {
        let cov = [4.0, 0.5, -0.3, 3.0, 0.7, 2.0];
        let m = Matrix3::<f64>::new(4.0, 0.5, -0.3, 0.5, 3.0, 0.7, -0.3, 0.7, 2.0);
        let inv = m.try_inverse().unwrap();
        let d = nalgebra::Vector3::new(0.8, -1.1, 0.4);
        let q = (d.transpose() * inv * d)[(0, 0)];
        let v = evaluate_3d_gaussian([0.8, -1.1, 0.4], 0.0, 1.0, [0.0; 3], cov);
        assert!((v - (-0.5 * q).exp()).abs() < 1e-14);
    }

    #[test]
    fn principal_sigmas_are_sorted_and_rotation_invariant() {
        // diag(9, 1) rotated by 30 degrees.
        let (s, c) = (30f64.to_radians().sin(), 30f64.to_radians().cos());
        let cov = [9.0 * c * c + s * s, (9.0 - 1.0) * c * s, 9.0 * s * s + c * c];
        let pcs = principal_sigmas_2d(cov);
        assert!((pcs[0] - 3.0).abs() < 1e-12 && (pcs[1] - 1.0).abs() < 1e-12, "{pcs:?}");

        // 90 degree rotation of a 3D blob swaps y and x.
        let a = principal_sigmas_3d([16.0, 0.0, 0.0, 4.0, 0.0, 1.0]);
        let b = principal_sigmas_3d([16.0, 0.0, 0.0, 1.0, 0.0, 4.0]);
        assert_eq!(a, [4.0, 2.0, 1.0]);
        assert_eq!(a, b);
    }

    #[test]
    fn negative_variances_are_sign_corrected() {
        let pcs = principal_sigmas_2d([-4.0, 0.0, 1.0]);
        assert_eq!(pcs, [2.0, 1.0]);
    }
}
