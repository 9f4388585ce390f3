//! Gaussian fitters for a bead crop.
//!
//! Three fitters look at the same 3D crop:
//!
//! - `ZFitter`: 1D Gaussian on the Z column through the bead's YX pixel
//! - `YXFitter`: 2D Gaussian on the bead's Z slice
//! - `ZYXFitter`: 3D Gaussian on the whole crop
//!
//! The bead sits at the crop centre unless the crop was clipped at a volume
//! edge; `centred_on` takes its actual crop index.
//!
//! Each one builds its sample, seeds the solver from an `Estimator` and turns
//! the optimum plus its covariance into a fit record. Coordinates are
//! crop-relative and physical, so `mu` values are offsets from the crop origin.

use std::fmt;

use log::{debug, warn};
use ndarray::{Dimension, s};
use serde::{Deserialize, Serialize};

use crate::domain::Bead;
use crate::error::PsfError;
use crate::fit::{
    Sample, YXEstimator, YXFitRecord, YXSample, ZEstimator, ZFitRecord, ZSample, ZYXEstimator, ZYXFitRecord,
    ZYXSample,
};
use crate::image::{CalibratedImage1D, CalibratedImage2D, CalibratedImage3D};
use crate::math::{LeastSquaresFit, SolveError, SolverOptions, levenberg_marquardt};
use crate::models::{FWHM_FACTOR, fwhm, gaussian_1d, gaussian_2d, gaussian_3d, principal_sigmas_2d, principal_sigmas_3d};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitterKind {
    Z,
    Yx,
    Zyx,
}

impl fmt::Display for FitterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FitterKind::Z => "Z",
            FitterKind::Yx => "YX",
            FitterKind::Zyx => "ZYX",
        };
        f.write_str(name)
    }
}

/// Run the solver for `model` over every point of `sample`.
///
/// `model` maps a physical position and a parameter vector to an intensity.
/// Solver failures are turned into `PsfError`s that carry the fitter kind, the
/// bead (when known) and the seeds.
pub fn fit_numeric_model<D, const N: usize, F>(
    kind: FitterKind,
    sample: &Sample<D, N>,
    model: F,
    seeds: Vec<f64>,
    options: &SolverOptions,
    bead: Option<Bead>,
) -> Result<LeastSquaresFit, PsfError>
where
    D: Dimension,
    F: Fn([f64; N], &[f64]) -> f64,
{
    let coordinates = sample.ravelled_coordinates();
    let observed = sample.ravelled_values();
    let predict = |params: &[f64]| coordinates.iter().map(|&c| model(c, params)).collect::<Vec<f64>>();

    match levenberg_marquardt(predict, &observed, &seeds, options) {
        Ok(fit) => {
            debug!(
                "{kind} fit converged in {} iterations (cost {:.4e}, {} points)",
                fit.iterations,
                fit.cost,
                observed.len()
            );
            Ok(fit)
        }
        Err(err) => {
            warn!(
                "{kind} fit failed{}: {err}; seeds {seeds:?}",
                bead.map(|b| format!(" at bead {b}")).unwrap_or_default()
            );
            Err(match err {
                SolveError::Timeout { elapsed } => PsfError::Timeout {
                    fitter: kind,
                    bead,
                    elapsed_ms: elapsed.as_millis(),
                },
                SolveError::InvalidProblem(reason) => PsfError::InvalidInput(reason),
                other => PsfError::ConvergenceFailure {
                    fitter: kind,
                    bead,
                    reason: other.to_string(),
                    seeds,
                },
            })
        }
    }
}

/// First-order FWHM error of a sigma fitted as the variance `c`.
fn variance_fwhm_sde(variance: f64, variance_sde: f64) -> f64 {
    FWHM_FACTOR * variance_sde / (2.0 * variance.abs().sqrt())
}

fn center_of(shape: &[usize]) -> [usize; 3] {
    [shape[0] / 2, shape[1] / 2, shape[2] / 2]
}

fn check_center(shape: &[usize], center: [usize; 3]) -> Result<(), PsfError> {
    if center.iter().zip(shape).any(|(&c, &n)| c >= n) {
        return Err(PsfError::invalid(format!(
            "bead index {center:?} lies outside the crop of shape {shape:?}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ZFitter {
    estimator: ZEstimator,
    bead: Option<Bead>,
    options: SolverOptions,
}

impl ZFitter {
    /// Fit through the crop centre.
    pub fn new(image: &CalibratedImage3D) -> Result<Self, PsfError> {
        Self::centred_on(image, center_of(image.shape()))
    }

    /// Fit the Z column through `center` (crop voxel index), e.g. a bead
    /// that sits off centre in a clipped crop.
    pub fn centred_on(image: &CalibratedImage3D, center: [usize; 3]) -> Result<Self, PsfError> {
        check_center(image.shape(), center)?;
        let [cz, cy, cx] = center;
        let column = image.data().slice(s![.., cy, cx]).to_owned();
        let sample = ZSample::new(CalibratedImage1D::new(column, [image.spacing()[0]])?);
        Ok(Self {
            estimator: ZEstimator::around(sample, [cz]),
            bead: None,
            options: SolverOptions::default(),
        })
    }

    pub fn with_bead(mut self, bead: Bead) -> Self {
        self.bead = Some(bead);
        self
    }

    pub fn with_options(mut self, options: SolverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn estimator(&self) -> &ZEstimator {
        &self.estimator
    }

    pub fn seeds(&self) -> Vec<f64> {
        let e = &self.estimator;
        vec![e.background(), e.amplitude(), e.centroid_abs()[0], e.sigma()]
    }

    pub fn fit(&self) -> Result<ZFitRecord, PsfError> {
        let fit = fit_numeric_model(
            FitterKind::Z,
            self.estimator.sample(),
            |[z], p| gaussian_1d(z, p),
            self.seeds(),
            &self.options,
            self.bead,
        )?;
        let p = &fit.params;
        let sde = fit.standard_errors();
        let sigma = p[3].abs();

        Ok(ZFitRecord {
            z_bg: p[0],
            z_amp: p[1],
            z_mu: p[2],
            z_sigma: sigma,
            z_fwhm: fwhm(sigma),
            z_bg_sde: sde[0],
            z_amp_sde: sde[1],
            z_mu_sde: sde[2],
            z_sigma_sde: sde[3],
            z_fwhm_sde: FWHM_FACTOR * sde[3],
        })
    }
}

#[derive(Debug, Clone)]
pub struct YXFitter {
    estimator: YXEstimator,
    bead: Option<Bead>,
    options: SolverOptions,
}

impl YXFitter {
    /// Fit the central Z slice.
    pub fn new(image: &CalibratedImage3D) -> Result<Self, PsfError> {
        Self::centred_on(image, center_of(image.shape()))
    }

    /// Fit the Z slice through `center` (crop voxel index).
    pub fn centred_on(image: &CalibratedImage3D, center: [usize; 3]) -> Result<Self, PsfError> {
        check_center(image.shape(), center)?;
        let [cz, cy, cx] = center;
        let plane = image.data().slice(s![cz, .., ..]).to_owned();
        let [_, sy, sx] = image.spacing();
        let sample = YXSample::new(CalibratedImage2D::new(plane, [sy, sx])?);
        Ok(Self {
            estimator: YXEstimator::around(sample, [cy, cx]),
            bead: None,
            options: SolverOptions::default(),
        })
    }

    pub fn with_bead(mut self, bead: Bead) -> Self {
        self.bead = Some(bead);
        self
    }

    pub fn with_options(mut self, options: SolverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn estimator(&self) -> &YXEstimator {
        &self.estimator
    }

    pub fn seeds(&self) -> Vec<f64> {
        let e = &self.estimator;
        let [mu_y, mu_x] = e.centroid_abs();
        let [sy, sx] = e.sigmas();
        vec![e.background(), e.amplitude(), mu_y, mu_x, sy * sy, 0.0, sx * sx]
    }

    pub fn fit(&self) -> Result<YXFitRecord, PsfError> {
        let fit = fit_numeric_model(
            FitterKind::Yx,
            self.estimator.sample(),
            gaussian_2d,
            self.seeds(),
            &self.options,
            self.bead,
        )?;
        let p = &fit.params;
        let sde = fit.standard_errors();
        let [pc1, pc2] = principal_sigmas_2d([p[4], p[5], p[6]]);

        Ok(YXFitRecord {
            yx_bg: p[0],
            yx_amp: p[1],
            y_mu: p[2],
            x_mu: p[3],
            yx_cyy: p[4],
            yx_cyx: p[5],
            yx_cxx: p[6],
            y_fwhm: fwhm(p[4].abs().sqrt()),
            x_fwhm: fwhm(p[6].abs().sqrt()),
            yx_pc1_fwhm: fwhm(pc1),
            yx_pc2_fwhm: fwhm(pc2),
            yx_bg_sde: sde[0],
            yx_amp_sde: sde[1],
            y_mu_sde: sde[2],
            x_mu_sde: sde[3],
            yx_cyy_sde: sde[4],
            yx_cyx_sde: sde[5],
            yx_cxx_sde: sde[6],
            y_fwhm_sde: variance_fwhm_sde(p[4], sde[4]),
            x_fwhm_sde: variance_fwhm_sde(p[6], sde[6]),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ZYXFitter {
    estimator: ZYXEstimator,
    bead: Option<Bead>,
    options: SolverOptions,
}

impl ZYXFitter {
    pub fn new(image: &CalibratedImage3D) -> Result<Self, PsfError> {
        Self::centred_on(image, center_of(image.shape()))
    }

    /// Seed from the bead at `center` (crop voxel index).
    pub fn centred_on(image: &CalibratedImage3D, center: [usize; 3]) -> Result<Self, PsfError> {
        check_center(image.shape(), center)?;
        let sample = ZYXSample::new(image.clone());
        Ok(Self {
            estimator: ZYXEstimator::around(sample, center),
            bead: None,
            options: SolverOptions::default(),
        })
    }

    pub fn with_bead(mut self, bead: Bead) -> Self {
        self.bead = Some(bead);
        self
    }

    pub fn with_options(mut self, options: SolverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn estimator(&self) -> &ZYXEstimator {
        &self.estimator
    }

    pub fn seeds(&self) -> Vec<f64> {
        let e = &self.estimator;
        let [mu_z, mu_y, mu_x] = e.centroid_abs();
        let [sz, sy, sx] = e.sigmas();
        vec![
            e.background(),
            e.amplitude(),
            mu_z,
            mu_y,
            mu_x,
            sz * sz,
            0.0,
            0.0,
            sy * sy,
            0.0,
            sx * sx,
        ]
    }

    pub fn fit(&self) -> Result<ZYXFitRecord, PsfError> {
        let fit = fit_numeric_model(
            FitterKind::Zyx,
            self.estimator.sample(),
            gaussian_3d,
            self.seeds(),
            &self.options,
            self.bead,
        )?;
        let p = &fit.params;
        let sde = fit.standard_errors();
        let [pc1, pc2, pc3] = principal_sigmas_3d([p[5], p[6], p[7], p[8], p[9], p[10]]);

        Ok(ZYXFitRecord {
            zyx_bg: p[0],
            zyx_amp: p[1],
            zyx_z_mu: p[2],
            zyx_y_mu: p[3],
            zyx_x_mu: p[4],
            zyx_czz: p[5],
            zyx_czy: p[6],
            zyx_czx: p[7],
            zyx_cyy: p[8],
            zyx_cyx: p[9],
            zyx_cxx: p[10],
            zyx_z_fwhm: fwhm(p[5].abs().sqrt()),
            zyx_y_fwhm: fwhm(p[8].abs().sqrt()),
            zyx_x_fwhm: fwhm(p[10].abs().sqrt()),
            zyx_pc1_fwhm: fwhm(pc1),
            zyx_pc2_fwhm: fwhm(pc2),
            zyx_pc3_fwhm: fwhm(pc3),
            zyx_bg_sde: sde[0],
            zyx_amp_sde: sde[1],
            zyx_z_mu_sde: sde[2],
            zyx_y_mu_sde: sde[3],
            zyx_x_mu_sde: sde[4],
            zyx_czz_sde: sde[5],
            zyx_czy_sde: sde[6],
            zyx_czx_sde: sde[7],
            zyx_cyy_sde: sde[8],
            zyx_cyx_sde: sde[9],
            zyx_cxx_sde: sde[10],
            zyx_z_fwhm_sde: variance_fwhm_sde(p[5], sde[5]),
            zyx_y_fwhm_sde: variance_fwhm_sde(p[8], sde[8]),
            zyx_x_fwhm_sde: variance_fwhm_sde(p[10], sde[10]),
        })
    }
}
