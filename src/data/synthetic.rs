//! Synthetic bead volumes.
//!
//! A volume is a constant background plus one 3D Gaussian per bead, with
//! optional additive Gaussian noise. Bead centres and covariances are in voxel
//! units; the spacing only calibrates the resulting image. Generation is
//! seeded, so the same `VolumeSpec` always renders the same volume.

use log::{debug, warn};
use ndarray::Array3;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::error::PsfError;
use crate::image::CalibratedImage3D;
use crate::models::evaluate_3d_gaussian;

/// Beads are rendered out to this many sigmas along each axis.
const RENDER_SIGMAS: f64 = 6.0;
const MAX_PLACEMENT_ATTEMPTS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticBead {
    /// Centre in voxels (Z, Y, X).
    pub center: [f64; 3],
    pub amplitude: f64,
    /// `[czz, czy, czx, cyy, cyx, cxx]` in voxel².
    pub covariance: [f64; 6],
}

impl SyntheticBead {
    pub fn axis_aligned(center: [f64; 3], amplitude: f64, sigmas: [f64; 3]) -> Self {
        let [sz, sy, sx] = sigmas;
        Self {
            center,
            amplitude,
            covariance: [sz * sz, 0.0, 0.0, sy * sy, 0.0, sx * sx],
        }
    }

    fn extent(&self, axis: usize) -> f64 {
        let diag = [self.covariance[0], self.covariance[3], self.covariance[5]];
        RENDER_SIGMAS * diag[axis].abs().sqrt()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeSpec {
    pub shape: [usize; 3],
    pub spacing: [f64; 3],
    pub background: f64,
    pub beads: Vec<SyntheticBead>,
    /// Standard deviation of the additive noise (0 for none).
    pub noise_sigma: f64,
    pub seed: u64,
}

/// How `random_bead_field` places beads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeadField {
    pub count: usize,
    /// Minimum distance (voxels) between a bead centre and the volume edge.
    pub margin: usize,
    /// Minimum distance (voxels) between two bead centres.
    pub min_separation: f64,
    pub amplitude: f64,
    /// Per-axis sigma in voxels.
    pub sigmas: [f64; 3],
}

pub fn render_volume(spec: &VolumeSpec) -> Result<CalibratedImage3D, PsfError> {
    if spec.shape.contains(&0) {
        return Err(PsfError::invalid(format!("volume shape must be non-empty, got {:?}", spec.shape)));
    }
    if !(spec.noise_sigma.is_finite() && spec.noise_sigma >= 0.0) {
        return Err(PsfError::invalid(format!(
            "noise sigma must be finite and >= 0, got {}",
            spec.noise_sigma
        )));
    }

    let [nz, ny, nx] = spec.shape;
    let mut data = Array3::from_elem((nz, ny, nx), spec.background);

    for bead in &spec.beads {
        let mut lo = [0usize; 3];
        let mut hi = [0usize; 3];
        for axis in 0..3 {
            let c = bead.center[axis];
            let r = bead.extent(axis);
            lo[axis] = (c - r).floor().max(0.0) as usize;
            hi[axis] = ((c + r).ceil().max(0.0) as usize + 1).min(spec.shape[axis]);
        }
        for z in lo[0]..hi[0] {
            for y in lo[1]..hi[1] {
                for x in lo[2]..hi[2] {
                    let p = [z as f64, y as f64, x as f64];
                    data[[z, y, x]] += evaluate_3d_gaussian(p, 0.0, bead.amplitude, bead.center, bead.covariance);
                }
            }
        }
    }

    if spec.noise_sigma > 0.0 {
        let mut rng = StdRng::seed_from_u64(spec.seed);
        let normal = Normal::new(0.0, spec.noise_sigma)
            .map_err(|e| PsfError::invalid(format!("noise distribution error: {e}")))?;
        for v in data.iter_mut() {
            *v += normal.sample(&mut rng);
        }
    }

    debug!(
        "rendered {:?} volume with {} beads (noise sigma {})",
        spec.shape,
        spec.beads.len(),
        spec.noise_sigma
    );
    CalibratedImage3D::new(data, spec.spacing)
}

/// Place beads at seeded random integer positions.
///
/// Positions keep `margin` voxels from every edge and `min_separation` voxels
/// from each other. When the volume is too crowded fewer beads are returned.
pub fn random_bead_field(shape: [usize; 3], field: &BeadField, seed: u64) -> Vec<SyntheticBead> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut beads: Vec<SyntheticBead> = Vec::with_capacity(field.count);

    if shape.iter().any(|&n| n <= 2 * field.margin) {
        warn!("volume {shape:?} leaves no room inside a {} voxel margin", field.margin);
        return beads;
    }

    let mut attempts = 0;
    while beads.len() < field.count && attempts < MAX_PLACEMENT_ATTEMPTS {
        attempts += 1;
        let mut center = [0.0; 3];
        for axis in 0..3 {
            center[axis] = rng.gen_range(field.margin..shape[axis] - field.margin) as f64;
        }
        let crowded = beads.iter().any(|b| distance(b.center, center) < field.min_separation);
        if !crowded {
            beads.push(SyntheticBead::axis_aligned(center, field.amplitude, field.sigmas));
        }
    }

    if beads.len() < field.count {
        warn!(
            "placed {} of {} beads after {attempts} attempts",
            beads.len(),
            field.count
        );
    }
    beads
}

fn distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    a.iter().zip(b).map(|(p, q)| (p - q) * (p - q)).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_bead_spec(noise_sigma: f64) -> VolumeSpec {
        VolumeSpec {
            shape: [32, 64, 64],
            spacing: [200.0, 100.0, 100.0],
            background: 100.0,
            beads: vec![SyntheticBead::axis_aligned([16.0, 32.0, 32.0], 5000.0, [1.0, 1.2, 1.2])],
            noise_sigma,
            seed: 42,
        }
    }

    #[test]
    fn renders_background_plus_bead() {
        let volume = render_volume(&single_bead_spec(0.0)).unwrap();
        let data = volume.data();
        assert_eq!(volume.shape(), &[32, 64, 64]);
        assert_eq!(data[[16, 32, 32]], 5100.0);
        assert_eq!(data[[0, 0, 0]], 100.0);
        // One sigma along Z.
        let expected = 100.0 + 5000.0 * (-0.5f64).exp();
        assert!((data[[17, 32, 32]] - expected).abs() < 1e-9);
    }

    #[test]
    fn noise_is_seeded() {
        let a = render_volume(&single_bead_spec(10.0)).unwrap();
        let b = render_volume(&single_bead_spec(10.0)).unwrap();
        assert_eq!(a, b);
        let mut other = single_bead_spec(10.0);
        other.seed = 43;
        assert_ne!(a, render_volume(&other).unwrap());
    }

    #[test]
    fn rejects_empty_shape() {
        let mut spec = single_bead_spec(0.0);
        spec.shape = [0, 10, 10];
        assert!(render_volume(&spec).is_err());
    }

    #[test]
    fn random_field_respects_margin_and_separation() {
        let field = BeadField {
            count: 12,
            margin: 8,
            min_separation: 10.0,
            amplitude: 5000.0,
            sigmas: [1.0, 1.2, 1.2],
        };
        let beads = random_bead_field([32, 128, 128], &field, 5);
        assert_eq!(beads.len(), 12);
        for (i, a) in beads.iter().enumerate() {
            for axis in 0..3 {
                assert!(a.center[axis] >= 8.0);
                assert!(a.center[axis] < [32.0, 128.0, 128.0][axis] - 8.0);
            }
            for b in &beads[i + 1..] {
                assert!(distance(a.center, b.center) >= 10.0);
            }
        }
        assert_eq!(beads, random_bead_field([32, 128, 128], &field, 5));
    }
}
