//! Initial parameter estimates for the Gaussian fits.
//!
//! Everything is computed once from the sample at construction:
//!
//! - background: 10th percentile of the intensities
//! - peak: the local maximum nearest the expected bead position (the crop
//!   centre unless told otherwise) among those above half the crop's peak
//!   height, so a neighbouring bead inside the crop cannot take over
//! - amplitude: peak value minus background
//! - centroid: intensity-weighted mean position of the voxels at or above
//!   half maximum (background subtracted) that are connected to the peak
//! - sigmas: width of the half-maximum crossing along each axis through the
//!   peak, divided by the FWHM factor
//!
//! The estimates only need to land the solver in the right basin; they are
//! not reported.

use ndarray::{ArrayD, ArrayViewD, Dimension, Ix1, Ix2, Ix3, IxDyn};

use crate::fit::Sample;
use crate::math::percentile;
use crate::models::FWHM_FACTOR;

const BACKGROUND_PERCENTILE: f64 = 10.0;
/// Smallest sigma estimate, in voxels.
const MIN_SIGMA_VOXELS: f64 = 0.25;

#[derive(Debug, Clone, PartialEq)]
pub struct Estimator<D: Dimension, const N: usize> {
    sample: Sample<D, N>,
    background: f64,
    amplitude: f64,
    peak: [usize; N],
    centroid: [f64; N],
    sigmas: [f64; N],
}

pub type ZEstimator = Estimator<Ix1, 1>;
pub type YXEstimator = Estimator<Ix2, 2>;
pub type ZYXEstimator = Estimator<Ix3, 3>;

impl<D: Dimension, const N: usize> Estimator<D, N> {
    /// Estimate around the crop centre (`shape / 2` on every axis).
    pub fn new(sample: Sample<D, N>) -> Self {
        let shape = sample.image().shape();
        let mut center = [0usize; N];
        for (c, &n) in center.iter_mut().zip(shape) {
            *c = n / 2;
        }
        Self::around(sample, center)
    }

    /// Estimate for the bead expected at voxel index `center`.
    pub fn around(sample: Sample<D, N>, center: [usize; N]) -> Self {
        let values = sample.ravelled_values();
        let background = percentile(&values, BACKGROUND_PERCENTILE).unwrap_or(0.0);

        let data = sample.image().data().into_dyn();
        let offsets = neighbour_offsets(N);
        let mut global = [0usize; N];
        let mut max = f64::NEG_INFINITY;
        for (index, &v) in data.indexed_iter() {
            // Strict comparison keeps the first maximum in C order.
            if v > max {
                max = v;
                copy_index(&mut global, index.slice());
            }
        }

        let cutoff = background + (max - background) / 2.0;
        let mut peak = global;
        if let Some(local) = central_peak(&data, &center, cutoff, &offsets) {
            copy_index(&mut peak, &local);
        }
        let amplitude = data[peak.as_slice()] - background;

        let centroid = connected_centroid(&data, &peak, background, amplitude, &offsets)
            .unwrap_or_else(|| peak.map(|i| i as f64));
        let sigmas = half_max_sigmas(&sample, &peak, background + amplitude / 2.0);

        Self {
            sample,
            background,
            amplitude,
            peak,
            centroid,
            sigmas,
        }
    }

    pub fn sample(&self) -> &Sample<D, N> {
        &self.sample
    }

    pub fn background(&self) -> f64 {
        self.background
    }

    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    /// Index of the seed peak.
    pub fn peak(&self) -> [usize; N] {
        self.peak
    }

    /// Centroid in voxel units.
    pub fn centroid(&self) -> [f64; N] {
        self.centroid
    }

    /// Centroid in physical units.
    pub fn centroid_abs(&self) -> [f64; N] {
        let spacing = self.sample.image().spacing();
        let mut out = self.centroid;
        for (v, s) in out.iter_mut().zip(spacing) {
            *v *= s;
        }
        out
    }

    /// Per-axis sigma estimates in physical units.
    pub fn sigmas(&self) -> [f64; N] {
        self.sigmas
    }
}

impl ZEstimator {
    pub fn sigma(&self) -> f64 {
        self.sigmas[0]
    }
}

fn copy_index<const N: usize>(out: &mut [usize; N], index: &[usize]) {
    for (slot, &i) in out.iter_mut().zip(index) {
        *slot = i;
    }
}

/// All offsets in `{-1, 0, 1}^ndim` except the origin.
fn neighbour_offsets(ndim: usize) -> Vec<Vec<isize>> {
    let mut offsets: Vec<Vec<isize>> = vec![Vec::new()];
    for _ in 0..ndim {
        offsets = offsets
            .into_iter()
            .flat_map(|prefix| {
                (-1..=1).map(move |d| {
                    let mut next = prefix.clone();
                    next.push(d);
                    next
                })
            })
            .collect();
    }
    offsets.retain(|o| o.iter().any(|&d| d != 0));
    offsets
}

fn shifted(index: &[usize], offset: &[isize], shape: &[usize]) -> Option<Vec<usize>> {
    index
        .iter()
        .zip(offset)
        .zip(shape)
        .map(|((&i, &d), &n)| {
            let j = i as isize + d;
            (j >= 0 && (j as usize) < n).then_some(j as usize)
        })
        .collect()
}

/// Local maximum at or above `cutoff` closest to `center`; ties go to the
/// brighter voxel, then to C order.
fn central_peak(data: &ArrayViewD<'_, f64>, center: &[usize], cutoff: f64, offsets: &[Vec<isize>]) -> Option<Vec<usize>> {
    let shape = data.shape();
    let mut best: Option<(f64, f64, Vec<usize>)> = None;
    for (index, &v) in data.indexed_iter() {
        if v < cutoff {
            continue;
        }
        let index = index.slice();
        let is_max = offsets
            .iter()
            .all(|o| shifted(index, o, shape).is_none_or(|j| data[j.as_slice()] <= v));
        if !is_max {
            continue;
        }
        let dist2: f64 = index
            .iter()
            .zip(center)
            .map(|(&i, &c)| (i as f64 - c as f64).powi(2))
            .sum();
        let closer = match &best {
            None => true,
            Some((d, bv, _)) => dist2 < *d || (dist2 == *d && v > *bv),
        };
        if closer {
            best = Some((dist2, v, index.to_vec()));
        }
    }
    best.map(|(_, _, index)| index)
}

/// Weighted mean position of the above-half-maximum region grown from
/// `peak` (8/26-connected).
fn connected_centroid<const N: usize>(
    data: &ArrayViewD<'_, f64>,
    peak: &[usize; N],
    background: f64,
    amplitude: f64,
    offsets: &[Vec<isize>],
) -> Option<[f64; N]> {
    let cutoff = amplitude / 2.0;
    let inside = |v: f64| {
        let w = v - background;
        w >= cutoff && w > 0.0
    };
    if !inside(data[peak.as_slice()]) {
        return None;
    }

    let shape = data.shape();
    let mut visited = ArrayD::from_elem(IxDyn(shape), false);
    visited[peak.as_slice()] = true;
    let mut stack = vec![peak.to_vec()];
    let mut weight_sum = 0.0;
    let mut acc = [0.0; N];
    while let Some(index) = stack.pop() {
        let w = data[index.as_slice()] - background;
        weight_sum += w;
        for (a, &i) in acc.iter_mut().zip(&index) {
            *a += w * i as f64;
        }
        for o in offsets {
            if let Some(next) = shifted(&index, o, shape) {
                if !visited[next.as_slice()] && inside(data[next.as_slice()]) {
                    visited[next.as_slice()] = true;
                    stack.push(next);
                }
            }
        }
    }
    Some(acc.map(|a| a / weight_sum))
}

fn half_max_sigmas<D: Dimension, const N: usize>(sample: &Sample<D, N>, peak: &[usize; N], half: f64) -> [f64; N] {
    let data = sample.image().data().into_dyn();
    let spacing = sample.image().spacing();
    let mut sigmas = [0.0; N];
    let mut index = peak.to_vec();
    for axis in 0..N {
        let len = data.shape()[axis];
        let lane: Vec<f64> = (0..len)
            .map(|i| {
                index[axis] = i;
                data[index.as_slice()]
            })
            .collect();
        index[axis] = peak[axis];

        let width = half_max_width(&lane, peak[axis], half);
        sigmas[axis] = (width / FWHM_FACTOR).max(MIN_SIGMA_VOXELS) * spacing[axis];
    }
    sigmas
}

/// Distance between the interpolated half-maximum crossings either side of
/// `peak`. A profile that never drops below `half` extends half a voxel past
/// the edge.
fn half_max_width(lane: &[f64], peak: usize, half: f64) -> f64 {
    let mut left = -0.5;
    for i in (0..peak).rev() {
        if lane[i] < half {
            let (lo, hi) = (lane[i], lane[i + 1]);
            left = i as f64 + (half - lo) / (hi - lo);
            break;
        }
    }
    let mut right = lane.len() as f64 - 0.5;
    for j in peak + 1..lane.len() {
        if lane[j] < half {
            let (hi, lo) = (lane[j - 1], lane[j]);
            right = (j - 1) as f64 + (hi - half) / (hi - lo);
            break;
        }
    }
    right - left
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::{YXSample, ZSample, ZYXSample};
    use crate::image::{CalibratedImage1D, CalibratedImage2D, CalibratedImage3D};
    use crate::models::{evaluate_1d_gaussian, evaluate_2d_gaussian, evaluate_3d_gaussian};
    use ndarray::{Array1, Array2, Array3};

    #[test]
    fn one_d_estimates_follow_the_profile() {
        let sigma_vox = 2.0;
        let data = Array1::from_shape_fn(33, |i| evaluate_1d_gaussian(i as f64, 100.0, 1000.0, 16.0, sigma_vox));
        let estimator = ZEstimator::new(ZSample::new(CalibratedImage1D::new(data, [200.0]).unwrap()));

        assert!((estimator.background() - 100.0).abs() < 1.0, "{}", estimator.background());
        assert!((estimator.amplitude() - 1000.0).abs() < 1.0);
        assert_eq!(estimator.peak(), [16]);
        assert!((estimator.centroid()[0] - 16.0).abs() < 1e-9);
        assert!((estimator.centroid_abs()[0] - 3200.0).abs() < 1e-6);
        // Linear interpolation of the crossing is within a few percent.
        let rel = (estimator.sigma() - sigma_vox * 200.0).abs() / (sigma_vox * 200.0);
        assert!(rel < 0.05, "sigma {}", estimator.sigma());
    }

    #[test]
    fn two_d_estimates_are_per_axis() {
        let data = Array2::from_shape_fn((21, 21), |(y, x)| {
            evaluate_2d_gaussian([y as f64, x as f64], 50.0, 500.0, [9.0, 11.0], [9.0, 0.0, 2.25])
        });
        let estimator = YXEstimator::new(YXSample::new(CalibratedImage2D::new(data, [100.0, 100.0]).unwrap()));
        let c = estimator.centroid();
        assert!((c[0] - 9.0).abs() < 1e-9 && (c[1] - 11.0).abs() < 1e-9, "{c:?}");
        let s = estimator.sigmas();
        assert!((s[0] - 300.0).abs() < 20.0, "{s:?}");
        assert!((s[1] - 150.0).abs() < 15.0, "{s:?}");
    }

    #[test]
    fn flat_sample_seeds_at_the_centre() {
        let data = Array3::<f64>::from_elem((4, 4, 4), 7.0);
        let estimator = ZYXEstimator::new(ZYXSample::new(CalibratedImage3D::new(data, [1.0, 1.0, 1.0]).unwrap()));
        assert_eq!(estimator.amplitude(), 0.0);
        assert_eq!(estimator.peak(), [2, 2, 2]);
        assert_eq!(estimator.centroid(), [2.0, 2.0, 2.0]);
        // Never drops below half maximum: full width plus the half-voxel edges.
        assert!((estimator.sigmas()[0] - 4.0 / FWHM_FACTOR).abs() < 1e-12);
    }

    fn two_beads(first: [f64; 3], second: [f64; 3]) -> CalibratedImage3D {
        let cov = [1.0, 0.0, 0.0, 1.44, 0.0, 1.44];
        let data = Array3::from_shape_fn((16, 16, 16), |(z, y, x)| {
            let p = [z as f64, y as f64, x as f64];
            evaluate_3d_gaussian(p, 100.0, 5000.0, first, cov) + evaluate_3d_gaussian(p, 0.0, 5000.0, second, cov)
        });
        CalibratedImage3D::new(data, [200.0, 100.0, 100.0]).unwrap()
    }

    #[test]
    fn neighbour_inside_the_crop_does_not_move_the_seeds() {
        // Equal brightness, the neighbour comes first in C order.
        let image = two_beads([8.0, 8.0, 8.0], [8.0, 8.0, 0.0]);
        let estimator = ZYXEstimator::new(ZYXSample::new(image));

        assert_eq!(estimator.peak(), [8, 8, 8]);
        assert!((estimator.amplitude() - 5000.0).abs() < 1.0, "{}", estimator.amplitude());
        for (c, want) in estimator.centroid().iter().zip([8.0, 8.0, 8.0]) {
            assert!((c - want).abs() < 1e-3, "{:?}", estimator.centroid());
        }
        let s = estimator.sigmas();
        assert!((s[2] - 120.0).abs() < 12.0, "{s:?}");
    }

    #[test]
    fn brighter_neighbour_does_not_take_over() {
        let cov = [1.0, 0.0, 0.0, 1.44, 0.0, 1.44];
        let data = Array3::from_shape_fn((16, 16, 16), |(z, y, x)| {
            let p = [z as f64, y as f64, x as f64];
            evaluate_3d_gaussian(p, 100.0, 4000.0, [8.0, 8.0, 8.0], cov)
                + evaluate_3d_gaussian(p, 0.0, 6000.0, [8.0, 2.0, 14.0], cov)
        });
        let image = CalibratedImage3D::new(data, [200.0, 100.0, 100.0]).unwrap();
        let estimator = ZYXEstimator::new(ZYXSample::new(image));
        assert_eq!(estimator.peak(), [8, 8, 8]);
        assert!((estimator.amplitude() - 4000.0).abs() < 1.0, "{}", estimator.amplitude());
    }

    #[test]
    fn around_targets_an_off_centre_bead() {
        let image = two_beads([3.0, 8.0, 8.0], [12.0, 8.0, 8.0]);
        let sample = ZYXSample::new(image);
        assert_eq!(ZYXEstimator::around(sample.clone(), [3, 8, 8]).peak(), [3, 8, 8]);
        assert_eq!(ZYXEstimator::around(sample, [11, 8, 8]).peak(), [12, 8, 8]);
    }

    #[test]
    fn estimates_are_deterministic() {
        let data = Array3::from_shape_fn((9, 9, 9), |(z, y, x)| {
            evaluate_3d_gaussian([z as f64, y as f64, x as f64], 10.0, 90.0, [4.0, 4.0, 4.0], [4.0, 0.0, 0.0, 1.0, 0.0, 1.0])
        });
        let image = CalibratedImage3D::new(data, [200.0, 100.0, 100.0]).unwrap();
        let a = ZYXEstimator::new(ZYXSample::new(image.clone()));
        let b = ZYXEstimator::new(ZYXSample::new(image));
        assert_eq!(a, b);
    }

    #[test]
    fn half_max_width_interpolates_crossings() {
        let lane = [0.0, 0.0, 10.0, 10.0, 0.0];
        // crossings at 1.5 and 3.5
        assert!((half_max_width(&lane, 2, 5.0) - 2.0).abs() < 1e-12);
    }
}
